//! Recognition of OOM killer reports in kernel log lines.
//!
//! The kernel starts an OOM report with a line such as
//!
//! ```text
//! kernel: [ 8112.042316] java invoked oom-killer: gfp_mask=0x14200ca, order=0, oom_score_adj=0
//! kernel: [ 8112.042322] java cpuset=4f1d2c3b4a5e mems_allowed=0
//! ```
//!
//! and the line right after the trigger names the cpuset of the task, which for Docker
//! containers is the short container id.
use std::sync::LazyLock;

use regex::Regex;

use crate::container::ContainerID;

/// Substring that marks the first line of an OOM killer report.
pub const OOM_TRIGGER: &str = "invoked oom-killer";

static CGROUP_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"cpuset=(?:docker-)?([0-9a-f]{12})").expect("valid cgroup id regex")
});

/// The two lines of an OOM report the exporter looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OomEvent {
    pub trigger_line: String,
    pub following_line: String,
}

#[derive(Debug, thiserror::Error)]
#[error("no container id in line following OOM trigger: `{0}`")]
pub struct MissingContainerID(pub String);

impl OomEvent {
    /// Extracts the short container id from the line following the trigger.
    ///
    /// # Errors
    ///
    /// Returns [`MissingContainerID`] if the line carries no cpuset container id, e.g.
    /// because the killed task was not running in a container.
    pub fn container_id(&self) -> Result<ContainerID, MissingContainerID> {
        extract_container_id(&self.following_line)
            .ok_or_else(|| MissingContainerID(self.following_line.clone()))
    }
}

/// Finds the short container id in a `cpuset=` field.
///
/// Both the cgroupfs (`cpuset=<id>`) and systemd (`cpuset=docker-<id>.scope`) forms are
/// recognized.
///
/// # Examples
///
/// ```
/// # use oom_exporter::watcher::extract_container_id;
/// let id = extract_container_id("bar cpuset=abcdef012345 mems_allowed=0").unwrap();
/// assert_eq!(id.as_ref(), "abcdef012345");
/// assert!(extract_container_id("bar cpuset=/ mems_allowed=0").is_none());
/// ```
pub fn extract_container_id(line: &str) -> Option<ContainerID> {
    let raw = CGROUP_ID_PATTERN.captures(line)?.get(1)?.as_str();
    ContainerID::new(raw).ok()
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Scanning,
    Capture {
        trigger_line: String,
    },
}

/// Two-state line consumer producing [`OomEvent`]s.
///
/// In `Scanning` every line is checked for [`OOM_TRIGGER`]; a trigger switches to
/// `Capture`, where the next line, whatever it holds, completes the event.
#[derive(Debug, Default)]
pub struct OomDetector {
    state: State,
}

impl OomDetector {
    /// Consumes one line and returns an event once its second line has been seen.
    pub fn feed(&mut self, line: String) -> Option<OomEvent> {
        match std::mem::take(&mut self.state) {
            State::Scanning => {
                if line.contains(OOM_TRIGGER) {
                    log::trace!("OOM trigger: {}", line);
                    self.state = State::Capture { trigger_line: line };
                }
                None
            }
            State::Capture { trigger_line } => Some(OomEvent {
                trigger_line,
                following_line: line,
            }),
        }
    }

    #[cfg(test)]
    fn is_capturing(&self) -> bool {
        matches!(self.state, State::Capture { .. })
    }
}
