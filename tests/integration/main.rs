//! Integration tests: fake backends driving the full fetch, schedule and
//! export pipeline.

mod mock_source;
mod pipeline;
