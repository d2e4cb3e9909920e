use std::collections::HashMap;

use molasses::{ClientConfig, User};

pub fn main() -> molasses::Result<()> {
    env_logger::init();

    let api_key = std::env::var("MOLASSES_API_KEY").unwrap();
    let client = ClientConfig::from_api_key(api_key).to_client()?;

    // Subscribe to feature updates in the background.
    client.start()?;

    // Block waiting for features. Until this call returns, every feature is inactive.
    client.wait_for_features()?;

    println!("NEW_CHECKOUT for everybody: {}", client.is_active("NEW_CHECKOUT", None));

    let user = User::new("test-user").with_param("isBetaUser", true);
    let active = client.is_active("NEW_CHECKOUT", Some(&user));
    println!("NEW_CHECKOUT for {}: {}", user.id, active);

    if active {
        client.experiment_success("NEW_CHECKOUT", &user, &HashMap::new());
    }

    client.shutdown()
}
