//! Best-effort structured reads: an ordered list of page scripts, the first
//! one that returns something wins.

use autopilot::AutopilotError;
use serde_json::Value;
use tracing::debug;

use crate::webdriver::ScriptRunner;

/// One way of reading something off the page. The script returns `null` (or
/// `false`) when it cannot tell.
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub name: &'static str,
    pub script: &'static str,
}

/// Run `probes` in order and return the first confident result with the
/// probe's name.
///
/// A probe whose script throws is skipped; a lost session or transport
/// failure ends the read since no later probe can succeed.
pub async fn first_confident(
    runner: &dyn ScriptRunner,
    probes: &[Probe],
    args: &[Value],
) -> Result<Option<(&'static str, Value)>, AutopilotError> {
    for probe in probes {
        match runner.execute(probe.script, args.to_vec()).await {
            Ok(Value::Null) | Ok(Value::Bool(false)) => continue,
            Ok(value) => {
                debug!(probe = probe.name, "Probe answered");
                return Ok(Some((probe.name, value)));
            }
            Err(e) if e.is_connectivity() => return Err(e),
            Err(e) => debug!(probe = probe.name, error = %e, "Probe failed"),
        }
    }
    Ok(None)
}
