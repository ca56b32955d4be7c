//! Market movers: the favourite of every priced round.

use tracing::debug;

use super::valid_ranked;
use crate::types::{Favorite, Movement, Racecourse};

/// One favourite per round that has at least one valid price, in board
/// order. Ties go to the horse listed first.
pub fn favorites(racecourses: &[Racecourse]) -> Vec<Favorite> {
    let mut out = Vec::new();
    for course in racecourses {
        for round in &course.rounds {
            let Some(fav) = valid_ranked(&round.horses).first().copied() else {
                debug!(
                    racecourse = %course.name,
                    round = round.round_number,
                    "No priced runners, no favourite"
                );
                continue;
            };
            out.push(Favorite {
                racecourse: course.name.clone(),
                round: round.round_number,
                time: round.time.clone(),
                horse_number: fav.number,
                horse_name: fav.name.clone(),
                jockey: fav.jockey.clone(),
                position: fav.position,
                odds: fav.odds,
                previous_odds: fav.previous_odds,
                movement: Movement::between(fav.odds, fav.previous_odds),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Horse, Round};

    fn course(name: &str, rounds: Vec<Vec<Horse>>) -> Racecourse {
        Racecourse {
            name: name.into(),
            rounds: rounds
                .into_iter()
                .enumerate()
                .map(|(i, horses)| Round {
                    round_number: i as u32 + 1,
                    time: format!("1{i}:00"),
                    horses,
                })
                .collect(),
        }
    }

    #[test]
    fn test_favorite_is_shortest_price() {
        let rc = course(
            "Caulfield",
            vec![vec![
                Horse::sample(1, 5.0),
                Horse::sample(2, 2.5),
                Horse::sample(3, 0.0),
            ]],
        );
        let favs = favorites(&[rc]);
        assert_eq!(favs.len(), 1);
        assert_eq!(favs[0].horse_number, 2);
        assert_eq!(favs[0].odds, 2.5);
        assert_eq!(favs[0].racecourse, "Caulfield");
        assert_eq!(favs[0].time, "10:00");
        assert_eq!(favs[0].movement, Movement::Neutral);
    }

    #[test]
    fn test_unpriced_round_has_no_favorite() {
        let rc = course(
            "Doomben",
            vec![
                vec![Horse::sample(1, 0.0), Horse::sample(2, 0.0)],
                vec![Horse::sample(1, 3.0)],
            ],
        );
        let favs = favorites(&[rc]);
        assert_eq!(favs.len(), 1);
        assert_eq!(favs[0].round, 2);
    }

    #[test]
    fn test_tie_goes_to_first_listed() {
        let rc = course(
            "Ascot",
            vec![vec![Horse::sample(8, 3.0), Horse::sample(4, 3.0)]],
        );
        assert_eq!(favorites(&[rc])[0].horse_number, 8);
    }

    #[test]
    fn test_movement_against_previous_price() {
        let mut shortened = Horse::sample(1, 2.0);
        shortened.previous_odds = Some(2.6);
        let mut drifted = Horse::sample(1, 4.0);
        drifted.previous_odds = Some(3.5);

        let rc = course("Eagle Farm", vec![vec![shortened], vec![drifted]]);
        let favs = favorites(&[rc]);
        assert_eq!(favs[0].movement, Movement::Down);
        assert_eq!(favs[1].movement, Movement::Up);
    }

    #[test]
    fn test_board_order_preserved() {
        let a = course("A", vec![vec![Horse::sample(1, 2.0)]]);
        let b = course("B", vec![vec![Horse::sample(1, 2.0)], vec![Horse::sample(2, 2.0)]]);
        let order: Vec<(String, u32)> = favorites(&[a, b])
            .into_iter()
            .map(|f| (f.racecourse, f.round))
            .collect();
        assert_eq!(
            order,
            vec![("A".into(), 1), ("B".into(), 1), ("B".into(), 2)]
        );
    }
}
