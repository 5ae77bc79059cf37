use super::*;

pub const KNOWN_PARAMS: [&str; 7] = [
    "adjacency_db",
    "per_file_cap",
    "w_bm25",
    "w_path",
    "w_short",
    "w_title",
    "w_vec",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridValue {
    Bool(bool),
    Number(f64),
}

impl GridValue {
    fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("true") {
            return Ok(Self::Bool(true));
        }
        if raw.eq_ignore_ascii_case("false") {
            return Ok(Self::Bool(false));
        }
        raw.parse::<f64>()
            .map(Self::Number)
            .with_context(|| format!("invalid grid value `{raw}`"))
    }
}

impl fmt::Display for GridValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
        }
    }
}

/// Parameter name -> candidate values. Names are kept sorted, values keep
/// the order they were given in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Grid {
    params: BTreeMap<String, Vec<GridValue>>,
}

impl Grid {
    pub fn from_map(params: BTreeMap<String, Vec<GridValue>>) -> Result<Self> {
        if params.is_empty() {
            bail!("grid defines no parameters");
        }

        for (name, values) in &params {
            if values.is_empty() {
                bail!("grid parameter `{name}` has no values");
            }
            let mut scratch = WeightPatch::default();
            for value in values {
                assign(&mut scratch, name, *value)?;
            }
        }
        Ok(Self { params })
    }

    /// YAML or JSON mapping of parameter name to value list.
    pub fn parse_document(raw: &str) -> Result<Self> {
        let params = serde_yaml::from_str::<BTreeMap<String, Vec<GridValue>>>(raw)
            .context("failed to parse grid document")?;
        Self::from_map(params)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read grid file {}", path.display()))?;
        Self::parse_document(&raw).with_context(|| format!("invalid grid file {}", path.display()))
    }

    /// `name=v1,v2,...` specs; repeated names append values.
    pub fn parse_params(specs: &[String]) -> Result<Self> {
        let mut params = BTreeMap::<String, Vec<GridValue>>::new();
        for spec in specs {
            let Some((name, values)) = spec.split_once('=') else {
                bail!("grid parameter `{spec}` must look like name=v1,v2");
            };
            let parsed = values
                .split(',')
                .filter(|value| !value.trim().is_empty())
                .map(GridValue::parse)
                .collect::<Result<Vec<GridValue>>>()
                .with_context(|| format!("invalid values for grid parameter `{}`", name.trim()))?;
            params.entry(name.trim().to_string()).or_default().extend(parsed);
        }
        Self::from_map(params)
    }

    pub fn params(&self) -> &BTreeMap<String, Vec<GridValue>> {
        &self.params
    }

    /// Number of combinations in the Cartesian product.
    pub fn len(&self) -> usize {
        if self.params.is_empty() {
            return 0;
        }
        self.params.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product in odometer order: the last parameter name varies
    /// fastest.
    pub fn combinations(&self) -> Result<Vec<WeightPatch>> {
        let mut combos = vec![WeightPatch::default()];
        for (name, values) in &self.params {
            let mut next = Vec::<WeightPatch>::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for value in values {
                    let mut patch = combo.clone();
                    assign(&mut patch, name, *value)?;
                    next.push(patch);
                }
            }
            combos = next;
        }
        Ok(combos)
    }
}

fn assign(patch: &mut WeightPatch, name: &str, value: GridValue) -> Result<()> {
    match (name, value) {
        ("adjacency_db", GridValue::Bool(flag)) => patch.adjacency_db = Some(flag),
        ("adjacency_db", GridValue::Number(_)) => {
            bail!("grid parameter `adjacency_db` takes true/false, got {value}")
        }
        ("per_file_cap", GridValue::Number(number)) => {
            if number.fract() != 0.0 || number < 1.0 || number > f64::from(u32::MAX) {
                bail!("grid parameter `per_file_cap` must be a positive integer, got {value}");
            }
            patch.per_file_cap = Some(number as u32);
        }
        (weight, GridValue::Number(number)) if KNOWN_PARAMS.contains(&weight) => {
            if !number.is_finite() || number < 0.0 {
                bail!("grid parameter `{weight}` must be a non-negative number, got {value}");
            }
            let slot = match weight {
                "w_path" => &mut patch.w_path,
                "w_short" => &mut patch.w_short,
                "w_title" => &mut patch.w_title,
                "w_bm25" => &mut patch.w_bm25,
                _ => &mut patch.w_vec,
            };
            *slot = Some(number);
        }
        (known, GridValue::Bool(_)) if KNOWN_PARAMS.contains(&known) => {
            bail!("grid parameter `{known}` takes numbers, got {value}")
        }
        (unknown, _) => bail!(
            "unknown grid parameter `{unknown}` (expected one of {})",
            KNOWN_PARAMS.join(", ")
        ),
    }
    Ok(())
}
