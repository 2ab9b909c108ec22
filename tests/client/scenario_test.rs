//! End-to-end scenario: build arguments from raw config, then run them.

use impacket_runner::client::Client;
use impacket_runner::config::ConnectionConfig;

fn scenario_config() -> ConnectionConfig {
    ConnectionConfig::new("H", "login@domain").with_password("")
}

#[test]
fn whoami_arguments_are_built_before_spawning() {
    let client = Client::new(scenario_config());
    let request = client.request("whoami", None);

    assert_eq!(
        client.args_for(&request),
        ["-no-pass", "domain/login@H", "whoami"]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn whoami_reaches_helper_with_built_arguments() {
    use impacket_runner::config::HelperConfig;

    let client = Client::with_helper(
        scenario_config(),
        HelperConfig::default().with_path(crate::support::fake_helper()),
    );

    let outcome = client.run("whoami").await.unwrap();
    assert_eq!(outcome.stdout, "-no-pass\ndomain/login@H\nwhoami\n");
    assert_eq!(outcome.stderr, "");
}
