//! Terminal output helpers for the LanBeam CLI.

use std::time::Duration;

const MIN_BOX_WIDTH: usize = 33;

/// A framed box showing the pairing address, optionally with a QR code below.
pub struct AddressBox<'a> {
    address: &'a str,
    qr: bool,
}

impl<'a> AddressBox<'a> {
    /// Create a new address box.
    #[must_use]
    pub const fn new(address: &'a str) -> Self {
        Self { address, qr: false }
    }

    /// Print a scannable QR code of the address under the box.
    #[must_use]
    pub const fn with_qr(mut self, qr: bool) -> Self {
        self.qr = qr;
        self
    }

    /// Display the box to stdout.
    pub fn display(&self) {
        for line in self.lines() {
            println!("{line}");
        }

        if self.qr {
            match lanbeam_core::qr::render_ascii(self.address) {
                Ok(code) => {
                    println!();
                    for row in code.lines() {
                        println!("  {row}");
                    }
                }
                Err(e) => tracing::warn!("Skipping QR code: {}", e),
            }
        }
    }

    fn lines(&self) -> Vec<String> {
        let width = box_width(self.address);
        let blank = format!("  │{}│", " ".repeat(width));
        vec![
            format!("  ┌{}┐", "─".repeat(width)),
            blank.clone(),
            format!("  │{}│", center_in_box("Pairing address", width)),
            blank.clone(),
            format!("  │{}│", center_in_box(self.address, width)),
            blank,
            format!("  └{}┘", "─".repeat(width)),
        ]
    }
}

fn box_width(content: &str) -> usize {
    (content.chars().count() + 4).max(MIN_BOX_WIDTH)
}

fn center_in_box(content: &str, width: usize) -> String {
    let content_len = content.chars().count();
    let padding = width.saturating_sub(content_len);
    let left = padding / 2;
    let right = padding - left;
    format!("{}{}{}", " ".repeat(left), content, " ".repeat(right))
}

/// Parse a duration string like "500ms", "30s", "5m" or "1h".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(num_str) = s.strip_suffix("ms") {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_millis(num))
    } else if let Some(num_str) = s.strip_suffix('m') {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_secs(num * 60))
    } else if let Some(num_str) = s.strip_suffix('s') {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_secs(num))
    } else if let Some(num_str) = s.strip_suffix('h') {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_secs(num * 3600))
    } else {
        None
    }
}

/// Shorten `s` to at most `max` characters, ending in "..." when cut.
pub fn truncate_string(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_in_box() {
        let centered = center_in_box("hello", 11);
        assert_eq!(centered, "   hello   ");

        let centered = center_in_box("hi", 6);
        assert_eq!(centered, "  hi  ");
    }

    #[test]
    fn test_address_box_grows_with_address() {
        let short = AddressBox::new("tcp://10.0.0.2:4000|A").lines();
        assert_eq!(short[0].chars().count(), MIN_BOX_WIDTH + 4);

        let long_address = "tcp://192.168.100.200:40000|Living-Room-Desktop";
        let long = AddressBox::new(long_address).lines();
        assert!(long[4].contains(long_address));
        assert!(long
            .iter()
            .all(|line| line.chars().count() == long[0].chars().count()));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("invalid"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Laptop", 20), "Laptop");
        assert_eq!(truncate_string("A-very-long-device-name", 10), "A-very-...");
    }
}
