use std::collections::BTreeMap;

/// Source text with backslash continuations joined into logical lines.
#[derive(Debug)]
pub(crate) struct SplicedSource {
    pub code: String,
    /// Spliced line number -> first original line of the group (1-indexed).
    pub line_map: BTreeMap<usize, usize>,
}

/// Joins backslash-continued physical lines into single logical lines.
///
/// A trailing backslash at end-of-input is simply stripped; this phase
/// never produces diagnostics.
pub(crate) fn splice_lines(source: &str) -> SplicedSource {
    let lines: Vec<&str> = source.split('\n').collect();
    let mut out = Vec::with_capacity(lines.len());
    let mut line_map = BTreeMap::new();

    let mut index = 0;
    while index < lines.len() {
        let first_original = index + 1;
        let mut joined = lines[index].to_string();
        index += 1;

        loop {
            let trimmed = joined.trim_end();
            if !trimmed.ends_with('\\') {
                break;
            }
            let keep = trimmed.len() - 1;
            joined.truncate(keep);
            if index < lines.len() {
                joined.push_str(lines[index]);
                index += 1;
            } else {
                break;
            }
        }

        out.push(joined);
        line_map.insert(out.len(), first_original);
    }

    SplicedSource {
        code: out.join("\n"),
        line_map,
    }
}
