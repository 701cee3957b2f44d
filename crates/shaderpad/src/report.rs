use std::collections::BTreeMap;

/// One parsed line of WebGL driver error output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub column: usize,
    /// Line number in the preprocessed source the driver compiled.
    pub output_line: usize,
    pub message: String,
}

/// Parses a driver error line of the form `ERROR: <col>:<line>: <message>`.
pub fn parse_driver_error(line: &str) -> Option<DriverError> {
    let rest = line.trim().strip_prefix("ERROR:")?.trim_start();
    let (column, rest) = rest.split_once(':')?;
    let (output_line, message) = rest.split_once(':')?;

    Some(DriverError {
        column: column.trim().parse().ok()?,
        output_line: output_line.trim().parse().ok()?,
        message: message.trim().to_string(),
    })
}

/// Rewrites every driver error line against the original source using the
/// preprocessor's line mapping. Lines that do not look like driver errors
/// pass through untouched; unmappable line numbers are reported as line 0.
pub fn translate_driver_log(log: &str, line_mapping: &BTreeMap<usize, usize>) -> Vec<String> {
    log.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match parse_driver_error(line) {
            Some(error) => {
                let original = line_mapping.get(&error.output_line).copied().unwrap_or(0);
                format!("ERROR: {}:{}: {}", error.column, original, error.message)
            }
            None => line.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(usize, usize)]) -> BTreeMap<usize, usize> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn parses_driver_error_shape() {
        let parsed = parse_driver_error("ERROR: 0:12: 'foo' : undeclared identifier").unwrap();
        assert_eq!(parsed.column, 0);
        assert_eq!(parsed.output_line, 12);
        assert!(parsed.message.contains("undeclared identifier"));
    }

    #[test]
    fn rejects_unrelated_lines() {
        assert!(parse_driver_error("WARNING: 0:3: extension").is_none());
        assert!(parse_driver_error("ERROR: not numeric").is_none());
    }

    #[test]
    fn translates_through_mapping() {
        let mapping = mapping(&[(1, 1), (2, 5)]);
        let out = translate_driver_log("ERROR: 0:2: bad operand\nlinker note", &mapping);
        assert_eq!(out[0], "ERROR: 0:5: bad operand");
        assert_eq!(out[1], "linker note");
    }

    #[test]
    fn unmapped_lines_become_zero() {
        let out = translate_driver_log("ERROR: 0:99: mystery", &mapping(&[(1, 1)]));
        assert_eq!(out[0], "ERROR: 0:0: mystery");
    }
}
