use std::path::Path;

use crate::constants::GCODE_EXTENSION;

/// Job name used when the host provides an empty one.
pub const DEFAULT_JOB_NAME: &str = "print";

/// Resolves the file name a job is stored under on the server.
///
/// A supplied name keeps its directory part and stem and gets the G-code
/// extension instead of its own. Without one, `{job_name}.gcode` is used.
pub fn normalize_file_name(file_name: Option<&str>, job_name: &str) -> String {
    match file_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => {
            let path = Path::new(name);
            match path.extension() {
                // Only the final component's extension is touched.
                Some(_) => path
                    .with_extension(GCODE_EXTENSION)
                    .to_string_lossy()
                    .into_owned(),
                None => format!("{name}.{GCODE_EXTENSION}"),
            }
        }
        None => {
            let job_name = job_name.trim();
            let job_name = if job_name.is_empty() {
                DEFAULT_JOB_NAME
            } else {
                job_name
            };
            format!("{job_name}.{GCODE_EXTENSION}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_extension() {
        assert_eq!(normalize_file_name(Some("part.stl"), "job"), "part.gcode");
    }

    #[test]
    fn keeps_gcode_extension() {
        assert_eq!(normalize_file_name(Some("part.gcode"), "job"), "part.gcode");
    }

    #[test]
    fn replaces_only_last_extension() {
        assert_eq!(
            normalize_file_name(Some("bracket.v2.3mf"), "job"),
            "bracket.v2.gcode"
        );
    }

    #[test]
    fn appends_when_missing() {
        assert_eq!(normalize_file_name(Some("part"), "job"), "part.gcode");
    }

    #[test]
    fn keeps_directory_part() {
        assert_eq!(
            normalize_file_name(Some("out/part.stl"), "job"),
            "out/part.gcode"
        );
    }

    #[test]
    fn falls_back_to_job_name() {
        assert_eq!(normalize_file_name(None, "UM3_bracket"), "UM3_bracket.gcode");
        assert_eq!(normalize_file_name(Some("  "), "cube"), "cube.gcode");
    }

    #[test]
    fn empty_job_name_uses_default() {
        assert_eq!(normalize_file_name(None, ""), "print.gcode");
    }
}
