//! On-disk naming rules.
//!
//! ```text
//! <root>/NNNN/            session, 4 digits, one per run
//!        NNNN/MMMM/       rotating sub-directory, 4 digits, 1-based
//!             MMMM/IIIIIIII.jpg
//!             MMMM/IIIIIIII.gps
//! ```
//!
//! Only names and arithmetic live here, creating the directories is the
//! native crate's job.

/// File name of the per-session log inside the session directory
pub const SESSION_LOG_FILE: &str = "session.log";

/// Image file extension
pub const IMAGE_EXTENSION: &str = "jpg";

/// Telemetry file extension
pub const TELEMETRY_EXTENSION: &str = "gps";

/// Parse a directory name as a session number.
///
/// Accepts only non-empty, all ASCII digit names (`^\d+$`). Names too large
/// for a `u32` are treated as non-numeric.
pub fn parse_session_number(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// Next session number given the names of existing sibling directories.
pub fn next_session_number<'a, I>(names: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter_map(parse_session_number)
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

pub fn session_dir_name(session: u32) -> String {
    format!("{:04}", session)
}

/// 1-based sub-directory index for a 1-based picture index.
///
/// `floor((picture_index - 1) / capacity) + 1`. Picture index 0 (nothing
/// captured yet) maps to the first sub-directory.
pub fn subdir_index(picture_index: u32, capacity: u32) -> u32 {
    let capacity = capacity.max(1);
    picture_index.saturating_sub(1) / capacity + 1
}

pub fn subdir_name(index: u32) -> String {
    format!("{:04}", index)
}

pub fn image_file_name(picture_index: u32) -> String {
    format!("{:08}.{}", picture_index, IMAGE_EXTENSION)
}

pub fn telemetry_file_name(picture_index: u32) -> String {
    format!("{:08}.{}", picture_index, TELEMETRY_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_number() {
        assert_eq!(parse_session_number("0007"), Some(7));
        assert_eq!(parse_session_number("12"), Some(12));
        assert_eq!(parse_session_number(""), None);
        assert_eq!(parse_session_number("lost+found"), None);
        assert_eq!(parse_session_number("12a"), None);
        assert_eq!(parse_session_number("+12"), None);
        assert_eq!(parse_session_number("99999999999"), None);
    }

    #[test]
    fn test_next_session_number() {
        assert_eq!(next_session_number(Vec::<&str>::new()), 1);
        assert_eq!(next_session_number(["USB", "System Volume Information"]), 1);
        assert_eq!(next_session_number(["0001", "0003", "notes", "0002"]), 4);
        assert_eq!(next_session_number(["17"]), 18);
    }

    #[test]
    fn test_subdir_index() {
        assert_eq!(subdir_index(0, 900), 1);
        assert_eq!(subdir_index(1, 900), 1);
        assert_eq!(subdir_index(900, 900), 1);
        assert_eq!(subdir_index(901, 900), 2);
        assert_eq!(subdir_index(1800, 900), 2);
        assert_eq!(subdir_index(1801, 900), 3);
        assert_eq!(subdir_index(5, 1), 5);
        assert_eq!(subdir_index(5, 0), 5);
    }

    #[test]
    fn test_subdir_index_matches_formula() {
        for capacity in [1u32, 2, 7, 900, 1800] {
            for index in 1u32..4000 {
                assert_eq!(subdir_index(index, capacity), (index - 1) / capacity + 1);
            }
        }
    }

    #[test]
    fn test_file_names() {
        assert_eq!(session_dir_name(1), "0001");
        assert_eq!(session_dir_name(12345), "12345");
        assert_eq!(subdir_name(2), "0002");
        assert_eq!(image_file_name(3), "00000003.jpg");
        assert_eq!(telemetry_file_name(42), "00000042.gps");
    }
}
