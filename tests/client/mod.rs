//! Client facade tests.

mod facade_test;
mod scenario_test;

/// Verify the public client types are exported from the library.
#[test]
fn test_all_client_types_exported() {
    use impacket_runner::client::{
        Client, ClientEvent, EventChannel, RunEvents, RunRequest, DEFAULT_EVENT_CAPACITY,
    };
    use impacket_runner::config::{ConnectionConfig, RunOptions};

    let client = Client::new(ConnectionConfig::new("H", "u"));
    let _ = RunRequest::new("whoami", RunOptions::default());
    let channel = EventChannel::new();
    let _ = RunEvents::new(&channel, uuid::Uuid::nil());
    let _: fn(&ClientEvent) -> uuid::Uuid = ClientEvent::run_id;

    assert!(DEFAULT_EVENT_CAPACITY > 0);
    assert_eq!(client.events().listener_count(), 0);
}
