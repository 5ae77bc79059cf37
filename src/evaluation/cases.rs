use super::*;

/// Loads the evaluation dataset. A missing file or a dataset with no usable
/// case is a hard error; malformed individual records are skipped.
pub fn load_cases(path: &Path) -> Result<Vec<EvalCase>> {
    if !path.exists() {
        bail!("evaluation dataset not found: {}", path.display());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read evaluation dataset {}", path.display()))?;
    let cases = parse_cases(&raw);
    if cases.is_empty() {
        bail!("evaluation dataset has no usable cases: {}", path.display());
    }

    info!(path = %path.display(), cases = cases.len(), "evaluation cases loaded");
    Ok(cases)
}

/// Accepts a JSON array of case records or one record per line.
pub fn parse_cases(raw: &str) -> Vec<EvalCase> {
    if raw.trim_start().starts_with('[') {
        match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
            Ok(values) => {
                return values
                    .into_iter()
                    .enumerate()
                    .filter_map(|(position, value)| {
                        decode_case(serde_json::from_value::<EvalCaseRecord>(value), position + 1)
                    })
                    .collect();
            }
            Err(err) => {
                warn!(error = %err, "evaluation dataset is not a JSON array; reading it line by line");
            }
        }
    }

    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .filter_map(|(line_no, line)| {
            decode_case(serde_json::from_str::<EvalCaseRecord>(line.trim()), line_no + 1)
        })
        .collect()
}

fn decode_case(record: serde_json::Result<EvalCaseRecord>, line: usize) -> Option<EvalCase> {
    match record {
        Ok(record) => {
            let case = record.into_case();
            if case.id.is_empty() || case.query.trim().is_empty() {
                warn!(line, "skipping evaluation case without id or query");
                return None;
            }
            Some(case)
        }
        Err(err) => {
            warn!(line, error = %err, "skipping malformed evaluation case");
            None
        }
    }
}
