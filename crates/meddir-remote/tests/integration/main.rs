//! Integration tests for meddir-remote
//!
//! Uses wiremock to simulate the remote authority and verifies end-to-end
//! behavior of the RemoteClient and its port adapters.

mod common;

mod test_documents;
mod test_fetch;
mod test_folders;
