//! Integration tests

mod support;
mod test_session;
