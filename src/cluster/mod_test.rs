use anyhow::Result;

use super::*;
use crate::fixtures;

#[test]
fn peer_url_display_and_parse_round_trip() -> Result<()> {
    let url = fixtures::peer_url("10.0.0.7", 2380);
    assert_eq!(url.to_string(), "http://10.0.0.7:2380");
    let parsed = PeerUrl::parse("http://10.0.0.7:2380")?;
    assert_eq!(parsed, url);
    Ok(())
}

#[test]
fn peer_url_parse_rejects_hostnames_and_missing_ports() {
    assert!(PeerUrl::parse("http://peer-0.internal:2380").is_err(), "expected hostname peer URL to be rejected");
    assert!(PeerUrl::parse("http://10.0.0.7").is_err(), "expected portless peer URL to be rejected");
}

#[test]
fn peer_url_from_instance_uses_configured_scheme_and_port() {
    let instance = fixtures::instance("i-01", "10.0.0.7");
    let url = PeerUrl::from_instance(&instance, "https", 2480);
    assert_eq!(url.to_string(), "https://10.0.0.7:2480");
}

#[test]
fn scenario_display_and_parse_round_trip() -> Result<()> {
    assert_eq!(Scenario::New.to_string(), "new");
    assert_eq!(Scenario::Existing.to_string(), "existing");
    assert_eq!("new".parse::<Scenario>()?, Scenario::New);
    assert_eq!("existing".parse::<Scenario>()?, Scenario::Existing);
    assert!("other".parse::<Scenario>().is_err(), "expected unknown scenario to be rejected");
    Ok(())
}
