//! Board discovery and re-matching across port renumbering.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// vid:pid reported for ports without USB identity.
pub const PLACEHOLDER_VIDPID: &str = "0000:0000";

/// One line of `mpremote connect list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Serial port.
    pub port: String,
    /// `vid:pid` in hex.
    pub vidpid: String,
    /// Manufacturer / product text, possibly empty.
    pub description: String,
}

impl DeviceInfo {
    /// Board family guessed from the USB ids.
    pub fn family(&self) -> McuFamily {
        McuFamily::from_vidpid(&self.vidpid)
    }
}

/// Microcontroller families recognised by their USB vendor ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum McuFamily {
    /// Raspberry Pi RP2040 running MicroPython.
    Rp2040,
    /// ESP32 behind a CP210x or FTDI bridge.
    Esp32,
    /// STM32 boards.
    Stm32,
    /// Anything else.
    Unknown,
}

impl McuFamily {
    /// Classify a `vid:pid` string.
    pub fn from_vidpid(vidpid: &str) -> Self {
        let vidpid = vidpid.to_ascii_lowercase();
        let vendor = vidpid.split(':').next().unwrap_or_default();
        match (vidpid.as_str(), vendor) {
            ("2e8a:0005", _) => Self::Rp2040,
            (_, "10c4" | "0403") => Self::Esp32,
            (_, "0483") => Self::Stm32,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for McuFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rp2040 => "RP2040",
            Self::Esp32 => "ESP32",
            Self::Stm32 => "STM32",
            Self::Unknown => "Unknown",
        })
    }
}

/// Parse `mpremote connect list` output.
///
/// Each line is `port serial vid:pid manufacturer product...`. Lines without a
/// hex `vid:pid` in the third field are skipped.
pub fn parse_device_list(stdout: &str) -> Vec<DeviceInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [port, _serial, vidpid, rest @ ..] if is_vidpid(vidpid) => Some(DeviceInfo {
                    port: port.to_string(),
                    vidpid: vidpid.to_ascii_lowercase(),
                    description: rest.join(" "),
                }),
                _ => {
                    if !line.trim().is_empty() {
                        debug!(line, "Skipping unparsable device line");
                    }
                    None
                }
            }
        })
        .collect()
}

fn is_vidpid(field: &str) -> bool {
    let is_hex = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit());
    matches!(field.split_once(':'), Some((vid, pid)) if is_hex(vid) && is_hex(pid))
}

/// Answer to "use this board?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    /// Bind the project to this board.
    Yes,
    /// Try the next board.
    No,
    /// Stop asking.
    SkipAll,
}

/// User confirmation for boards the project is not yet bound to.
pub trait DevicePrompt {
    /// Ask whether `device` should be used.
    fn confirm(&self, device: &DeviceInfo) -> PromptAnswer;
}

/// Outcome of [`match_device`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMatch {
    /// The bound board was found, possibly on a new port.
    Known(DeviceInfo),
    /// The user picked a new board; its id should be persisted.
    Confirmed(DeviceInfo),
}

impl DeviceMatch {
    /// The matched board.
    pub fn device(&self) -> &DeviceInfo {
        match self {
            Self::Known(device) | Self::Confirmed(device) => device,
        }
    }
}

/// Find the project's board among `devices`.
///
/// A board whose id equals `bound_id` is reused silently. When the project is
/// not bound yet, every board with a real USB id is offered to `prompt` in
/// turn. Boards with a different id are never offered to a bound project.
pub fn match_device(
    devices: &[DeviceInfo],
    bound_id: Option<&str>,
    prompt: &dyn DevicePrompt,
) -> Option<DeviceMatch> {
    for device in devices {
        match bound_id {
            Some(id) if id.eq_ignore_ascii_case(&device.vidpid) => {
                info!(port = %device.port, vidpid = %device.vidpid, "Found bound device");
                return Some(DeviceMatch::Known(device.clone()));
            }
            Some(_) => continue,
            None if device.vidpid == PLACEHOLDER_VIDPID => continue,
            None => match prompt.confirm(device) {
                PromptAnswer::Yes => {
                    info!(port = %device.port, vidpid = %device.vidpid, "Device confirmed");
                    return Some(DeviceMatch::Confirmed(device.clone()));
                }
                PromptAnswer::SkipAll => return None,
                PromptAnswer::No => continue,
            },
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    const LIST: &str = "\
/dev/ttyS0 None 0000:0000 None None
/dev/ttyACM0 e6614c311b7e6f35 2e8a:0005 MicroPython Board in FS mode
/dev/ttyUSB0 0001 10c4:ea60 Silicon Labs CP2102 USB to UART Bridge Controller
garbage line
";

    struct Scripted {
        answers: RefCell<Vec<PromptAnswer>>,
        asked: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(answers: Vec<PromptAnswer>) -> Self {
            Self {
                answers: RefCell::new(answers),
                asked: RefCell::new(Vec::new()),
            }
        }
    }

    impl DevicePrompt for Scripted {
        fn confirm(&self, device: &DeviceInfo) -> PromptAnswer {
            self.asked.borrow_mut().push(device.port.clone());
            self.answers.borrow_mut().remove(0)
        }
    }

    #[test]
    fn test_parse_device_list() {
        let devices = parse_device_list(LIST);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[1].port, "/dev/ttyACM0");
        assert_eq!(devices[1].vidpid, "2e8a:0005");
        assert_eq!(devices[1].description, "MicroPython Board in FS mode");
        assert_eq!(devices[1].family(), McuFamily::Rp2040);
        assert_eq!(devices[2].family(), McuFamily::Esp32);
    }

    #[test]
    fn test_parse_skips_short_and_bad_lines() {
        assert!(parse_device_list("COM3 abc\nCOM4 x notanid\n\n").is_empty());
        assert!(parse_device_list("").is_empty());
    }

    #[test]
    fn test_family_detection() {
        assert_eq!(McuFamily::from_vidpid("0483:5740"), McuFamily::Stm32);
        assert_eq!(McuFamily::from_vidpid("0403:6001"), McuFamily::Esp32);
        assert_eq!(McuFamily::from_vidpid("2E8A:0005"), McuFamily::Rp2040);
        assert_eq!(McuFamily::from_vidpid("1234:5678"), McuFamily::Unknown);
    }

    #[test]
    fn test_bound_id_reused_without_prompt() {
        let devices = parse_device_list(LIST);
        let prompt = Scripted::new(vec![]);

        let matched = match_device(&devices, Some("10c4:ea60"), &prompt).unwrap();
        assert_eq!(matched, DeviceMatch::Known(devices[2].clone()));
        assert!(prompt.asked.borrow().is_empty());
    }

    #[test]
    fn test_bound_id_missing_returns_none() {
        let devices = parse_device_list(LIST);
        let prompt = Scripted::new(vec![]);
        assert_eq!(match_device(&devices, Some("dead:beef"), &prompt), None);
        assert!(prompt.asked.borrow().is_empty());
    }

    #[test]
    fn test_unbound_prompts_and_skips_placeholder() {
        let devices = parse_device_list(LIST);
        let prompt = Scripted::new(vec![PromptAnswer::No, PromptAnswer::Yes]);

        let matched = match_device(&devices, None, &prompt).unwrap();
        assert_eq!(matched, DeviceMatch::Confirmed(devices[2].clone()));
        assert_eq!(*prompt.asked.borrow(), vec!["/dev/ttyACM0", "/dev/ttyUSB0"]);
    }

    #[test]
    fn test_skip_all_stops_prompting() {
        let devices = parse_device_list(LIST);
        let prompt = Scripted::new(vec![PromptAnswer::SkipAll]);

        assert_eq!(match_device(&devices, None, &prompt), None);
        assert_eq!(prompt.asked.borrow().len(), 1);
    }
}
