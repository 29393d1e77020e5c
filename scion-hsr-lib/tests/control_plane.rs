//! Control-surface tests: context operations and configuration loading.

mod helpers;

use helpers::*;
use scion_hsr_lib::config::load_from_path;
use scion_hsr_lib::error::{ConfigError, Error, RegistryError};
use scion_hsr_lib::framework::InProcessHost;
use scion_hsr_lib::{AddExternalArgs, AddIntfArgs, AddrFamily, DelIntfArgs, LinkTo, ScionContext};
use std::io::Write;
use tempfile::NamedTempFile;

fn context() -> ScionContext {
    ScionContext::new(Box::new(InProcessHost::new())).expect("context")
}

#[test]
fn add_delete_round_trip() {
    let ctx = context();
    add_internal(&ctx, "10.0.0.1", 30041);
    add_external(&ctx, 5, "10.0.0.1", 50000, "10.0.0.2", 50000);
    assert_eq!(ctx.registry().load().len(), 2);

    ctx.delete_interface(&DelIntfArgs {
        ifid: 5,
        local: "10.0.0.1".parse().expect("addr"),
        local_port: 50000,
    })
    .expect("delete");
    ctx.delete_interface(&DelIntfArgs {
        ifid: 0,
        local: "10.0.0.1".parse().expect("addr"),
        local_port: 30041,
    })
    .expect("delete");

    assert!(ctx.registry().load().is_empty());
    assert!(ctx.format_interfaces().contains("No scion interfaces"));
}

#[test]
fn family_mismatch_is_a_config_error() {
    let ctx = context();
    let err = ctx
        .add_interface(&AddIntfArgs {
            ifid: 5,
            local: "10.0.0.1".parse().expect("addr"),
            local_port: 50000,
            external: Some(AddExternalArgs {
                remote: "2001:db8::2".parse().expect("addr"),
                remote_port: 50000,
                link_to: LinkTo::Child,
                isd_as: remote_isdas(),
            }),
        })
        .expect_err("family mismatch");
    assert!(matches!(err, Error::Config(ConfigError::InvalidValue(_))));
}

#[test]
fn identical_local_and_remote_rejected() {
    let ctx = context();
    let err = ctx
        .add_interface(&AddIntfArgs {
            ifid: 5,
            local: "10.0.0.1".parse().expect("addr"),
            local_port: 50000,
            external: Some(AddExternalArgs {
                remote: "10.0.0.1".parse().expect("addr"),
                remote_port: 50001,
                link_to: LinkTo::Child,
                isd_as: remote_isdas(),
            }),
        })
        .expect_err("identical addresses");
    assert!(matches!(err, Error::Config(ConfigError::InvalidValue(_))));
}

#[test]
fn registry_errors_pass_through() {
    let ctx = context();
    add_external(&ctx, 5, "10.0.0.1", 50000, "10.0.0.2", 50000);
    let err = ctx
        .add_interface(&AddIntfArgs {
            ifid: 5,
            local: "10.0.0.9".parse().expect("addr"),
            local_port: 50009,
            external: Some(AddExternalArgs {
                remote: "10.0.0.2".parse().expect("addr"),
                remote_port: 50000,
                link_to: LinkTo::Child,
                isd_as: remote_isdas(),
            }),
        })
        .expect_err("duplicate ifid");
    assert!(matches!(err, Error::Registry(RegistryError::IfAlreadyExists)));
}

#[test]
fn set_key_validates_inputs() {
    let ctx = context();
    ctx.set_key(0, &[0xaa; 16]).expect("valid key");
    assert!(matches!(
        ctx.set_key(99, &[0xaa; 16]),
        Err(Error::Config(ConfigError::InvalidValue(_)))
    ));
    assert!(matches!(
        ctx.set_key(0, &[0xaa; 33]),
        Err(Error::Config(ConfigError::InvalidValue(_)))
    ));
}

#[test]
fn bypass_enable_is_idempotent_via_context() {
    let ctx = context();
    ctx.set_bypass_enabled(7, AddrFamily::V4, true);
    ctx.set_bypass_enabled(7, AddrFamily::V4, true);
    assert!(ctx.features().is_enabled(7, AddrFamily::V4));
    ctx.set_bypass_enabled(7, AddrFamily::V4, false);
    ctx.set_bypass_enabled(7, AddrFamily::V4, false);
    assert!(!ctx.features().is_enabled(7, AddrFamily::V4));
}

#[test]
fn format_interfaces_describes_entries() {
    let ctx = context();
    add_external(&ctx, 5, "10.0.0.1", 50000, "10.0.0.2", 50000);
    let out = ctx.format_interfaces();
    assert!(out.contains("ifid 5"));
    assert!(out.contains("10.0.0.1"));
    assert!(out.contains("remote 10.0.0.2"));
    assert!(out.contains("link-to CHILD"));
    assert!(out.contains(&remote_isdas().to_string()));
}

#[test]
fn config_loads_and_applies() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
local_isd_as = "1-ff00:0:110"

[[keys]]
slot = 0
hex = "2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b"

[[interfaces]]
ifid = 0
local = "10.0.0.1"
local_port = 30041

[[interfaces]]
ifid = 5
local = "10.0.0.1"
local_port = 50000
remote = "10.0.0.2"
remote_port = 50000
link_to = "child"
isd_as = "1-ff00:0:111"

[bypass]
ip4 = [100]

[telemetry]
metrics_port = 9464
"#
    )?;

    let cfg = load_from_path(file.path())?;
    assert_eq!(cfg.local_isd_as, local_isdas());
    assert_eq!(cfg.interfaces.len(), 2);
    assert_eq!(cfg.telemetry.metrics_port, Some(9464));

    let ctx = context();
    ctx.apply_config(&cfg)?;
    assert_eq!(ctx.local_isdas(), local_isdas());
    assert_eq!(ctx.registry().load().len(), 2);
    assert!(ctx.features().is_enabled(100, AddrFamily::V4));
    assert!(!ctx.keys().hop_key().is_unset());

    Ok(())
}

#[test]
fn config_rejects_incomplete_external() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
local_isd_as = "1-ff00:0:110"

[[interfaces]]
ifid = 5
local = "10.0.0.1"
local_port = 50000
"#
    )?;
    assert!(load_from_path(file.path()).is_err());
    Ok(())
}

#[test]
fn config_rejects_duplicate_endpoints() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
local_isd_as = "1-ff00:0:110"

[[interfaces]]
ifid = 0
local = "10.0.0.1"
local_port = 30041

[[interfaces]]
ifid = 5
local = "10.0.0.1"
local_port = 30041
remote = "10.0.0.2"
remote_port = 50000
link_to = "child"
isd_as = "1-ff00:0:111"
"#
    )?;
    assert!(load_from_path(file.path()).is_err());
    Ok(())
}

#[test]
fn config_rejects_bad_keys() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    for (slot, hex) in [(9, "aa"), (0, "abc"), (0, "")] {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            r#"
local_isd_as = "1-ff00:0:110"

[[keys]]
slot = {slot}
hex = "{hex}"
"#
        )?;
        assert!(load_from_path(file.path()).is_err(), "slot={slot} hex={hex:?}");
    }
    Ok(())
}
