//! Bank/program naming convention
//!
//! Banks are directories named `NNN-Name` and programs are files named
//! `PPP-Name.ext`; the numeric part orders entries and maps to MIDI bank
//! and program changes.

/// Number of MIDI banks/programs addressable
pub const MAX_BANKS: u32 = 128;

/// Split `NNN-Name` on the first dash
pub fn split_numbered(name: &str) -> (String, String) {
    match name.split_once('-') {
        Some((num, rest)) => (num.to_string(), rest.to_string()),
        None => (name.to_string(), String::new()),
    }
}

/// Left-pad with zeros to `width`
pub fn zero_pad(num: &str, width: usize) -> String {
    format!("{:0>width$}", num, width = width)
}

/// Parse the numeric part of a bank or program
pub fn parse_number(num: &str) -> Option<u32> {
    num.trim().parse().ok()
}

/// First bank number below [`MAX_BANKS`] not in `existing`
pub fn next_bank_number(existing: &[String]) -> Option<u32> {
    (0..MAX_BANKS).find(|i| !existing.iter().any(|b| *b == zero_pad(&i.to_string(), 3)))
}

/// Directory or file stem for a number and optional name
pub fn numbered_name(num: &str, name: Option<&str>) -> String {
    match name.filter(|n| !n.is_empty()) {
        Some(name) => format!("{}-{}", num, name),
        None => num.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_numbered() {
        assert_eq!(split_numbered("001-Piano"), ("001".into(), "Piano".into()));
        assert_eq!(split_numbered("002-Synth-Lead"), ("002".into(), "Synth-Lead".into()));
        assert_eq!(split_numbered("003"), ("003".into(), String::new()));
    }

    #[test]
    fn test_zero_pad() {
        assert_eq!(zero_pad("1", 3), "001");
        assert_eq!(zero_pad("0042", 3), "0042");
        assert_eq!(zero_pad("", 3), "000");
    }

    #[test]
    fn test_next_bank_number() {
        assert_eq!(next_bank_number(&[]), Some(0));
        let existing = vec!["000".to_string(), "001".to_string(), "003".to_string()];
        assert_eq!(next_bank_number(&existing), Some(2));
        let full: Vec<String> = (0..MAX_BANKS).map(|i| zero_pad(&i.to_string(), 3)).collect();
        assert_eq!(next_bank_number(&full), None);
    }

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name("005", Some("Pads")), "005-Pads");
        assert_eq!(numbered_name("005", Some("")), "005");
        assert_eq!(numbered_name("005", None), "005");
    }
}
