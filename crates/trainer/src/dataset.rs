//! CSV dataset loading and preprocessing
//!
//! Reads a header row followed by typed feature columns and a boolean label in
//! the last column. Data is kept column-major so each column can seed one
//! input node of the graph directly.

use std::path::Path;

use symboost_graph::{Value, ValueType};

use crate::deterministic::row_hash;
use crate::errors::{Result, TrainerError};

/// Labelled dataset with named, typed feature columns
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub names: Vec<String>,
    pub types: Vec<ValueType>,
    pub columns: Vec<Vec<Value>>,
    pub labels: Vec<bool>,
}

fn is_missing_cell(cell: &str) -> bool {
    cell.is_empty() || cell == "?" || cell.eq_ignore_ascii_case("na")
}

fn parse_bool_cell(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_label(cell: &str) -> Option<bool> {
    match cell {
        "1" | "+1" => Some(true),
        "0" | "-1" => Some(false),
        other => parse_bool_cell(other),
    }
}

impl Dataset {
    /// Build from column-major values, inferring each column's type.
    ///
    /// A column is boolean when it holds booleans only (missing aside), numeric
    /// when it holds numbers only; mixed columns are rejected.
    pub fn from_columns(
        names: Vec<String>,
        columns: Vec<Vec<Value>>,
        labels: Vec<bool>,
    ) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(TrainerError::Dataset(format!(
                "{} column names for {} columns",
                names.len(),
                columns.len()
            )));
        }

        let mut types = Vec::with_capacity(columns.len());
        for (name, column) in names.iter().zip(&columns) {
            if column.len() != labels.len() {
                return Err(TrainerError::Dataset(format!(
                    "column '{}' has {} values, expected {}",
                    name,
                    column.len(),
                    labels.len()
                )));
            }
            let mut ty = None;
            for value in column {
                match (ty, value.value_type()) {
                    (_, None) => {}
                    (None, found) => ty = found,
                    (Some(expected), Some(found)) if expected != found => {
                        return Err(TrainerError::Dataset(format!(
                            "column '{}' mixes {} and {} values",
                            name, expected, found
                        )));
                    }
                    _ => {}
                }
            }
            types.push(ty.unwrap_or(ValueType::Double));
        }

        Ok(Self {
            names,
            types,
            columns,
            labels,
        })
    }

    /// Load a dataset from a CSV file
    /// Expected format: header row `name1,name2,...,label`, then one example per line.
    /// Empty cells, `?` and `NA` are missing values.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse_csv(&content)
            .map_err(|err| TrainerError::Dataset(format!("{}: {}", path.display(), err)))
    }

    /// Parse CSV text; see [`Dataset::from_csv`].
    pub fn parse_csv(content: &str) -> Result<Self> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

        let (_, header) = lines
            .next()
            .ok_or_else(|| TrainerError::Dataset("dataset is empty".to_string()))?;
        let header: Vec<&str> = header.split(',').map(str::trim).collect();
        if header.len() < 2 {
            return Err(TrainerError::Dataset(
                "expected at least one feature column and a label column".to_string(),
            ));
        }
        let feature_count = header.len() - 1;

        let mut cells: Vec<Vec<&str>> = vec![Vec::new(); feature_count];
        let mut labels = Vec::new();
        for (line_idx, line) in lines {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() != header.len() {
                return Err(TrainerError::Dataset(format!(
                    "line {}: expected {} columns, got {}",
                    line_idx + 1,
                    header.len(),
                    parts.len()
                )));
            }
            let label = parse_label(parts[feature_count]).ok_or_else(|| {
                TrainerError::Dataset(format!(
                    "line {}: invalid label '{}'",
                    line_idx + 1,
                    parts[feature_count]
                ))
            })?;
            for (column, cell) in cells.iter_mut().zip(&parts) {
                column.push(*cell);
            }
            labels.push(label);
        }

        if labels.is_empty() {
            return Err(TrainerError::Dataset("dataset has no examples".to_string()));
        }

        let mut columns = Vec::with_capacity(feature_count);
        for (name, raw) in header.iter().zip(&cells) {
            columns.push(Self::parse_column(name, raw)?);
        }
        let names = header[..feature_count].iter().map(|s| s.to_string()).collect();
        Self::from_columns(names, columns, labels)
    }

    fn parse_column(name: &str, raw: &[&str]) -> Result<Vec<Value>> {
        let boolean = raw
            .iter()
            .all(|cell| is_missing_cell(cell) || parse_bool_cell(cell).is_some());

        raw.iter()
            .enumerate()
            .map(|(row, cell)| {
                if is_missing_cell(cell) {
                    Ok(Value::Missing)
                } else if boolean {
                    Ok(Value::from(parse_bool_cell(cell)))
                } else {
                    cell.parse::<f64>().map(Value::finite).map_err(|_| {
                        TrainerError::Dataset(format!(
                            "column '{}', example {}: invalid number '{}'",
                            name,
                            row + 1,
                            cell
                        ))
                    })
                }
            })
            .collect()
    }

    /// Get number of examples
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.columns.len()
    }

    /// One example across all feature columns.
    pub fn row(&self, example: usize) -> Vec<Value> {
        self.columns.iter().map(|column| column[example]).collect()
    }

    /// Whether `other` has the same column names and types.
    pub fn same_schema(&self, other: &Dataset) -> bool {
        self.names == other.names && self.types == other.types
    }

    /// Share of examples labelled `true`.
    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|&&label| label).count() as f64 / self.labels.len() as f64
    }

    /// Deterministically shuffle the examples using seed
    pub fn shuffle(&mut self, seed: u64) {
        let mut order: Vec<(u64, usize)> = (0..self.len())
            .map(|example| (row_hash(&self.row(example), example, seed), example))
            .collect();
        order.sort_unstable();
        let order: Vec<usize> = order.into_iter().map(|(_, example)| example).collect();
        self.reorder(&order);
    }

    fn reorder(&mut self, order: &[usize]) {
        for column in &mut self.columns {
            *column = order.iter().map(|&example| column[example]).collect();
        }
        self.labels = order.iter().map(|&example| self.labels[example]).collect();
    }

    fn subset(&self, range: std::ops::Range<usize>) -> Dataset {
        Dataset {
            names: self.names.clone(),
            types: self.types.clone(),
            columns: self
                .columns
                .iter()
                .map(|column| column[range.clone()].to_vec())
                .collect(),
            labels: self.labels[range].to_vec(),
        }
    }

    /// Split into (train, validation); the last `fraction` of examples validates.
    pub fn split(&self, fraction: f64) -> Result<(Dataset, Dataset)> {
        if !(0.0..1.0).contains(&fraction) {
            return Err(TrainerError::Dataset(format!(
                "validation fraction {} must be in [0, 1)",
                fraction
            )));
        }
        let valid = (self.len() as f64 * fraction).round() as usize;
        let cut = self.len() - valid;
        if cut == 0 {
            return Err(TrainerError::Dataset(
                "validation split leaves no training examples".to_string(),
            ));
        }
        Ok((self.subset(0..cut), self.subset(cut..self.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> anyhow::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "flag,x,label")?;
        writeln!(file, "true,1.5,1")?;
        writeln!(file, "false,?,0")?;
        writeln!(file, "NA,-2,true")?;
        writeln!(file, "TRUE,4,-1")?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn test_load_csv() -> anyhow::Result<()> {
        let file = create_test_csv()?;
        let dataset = Dataset::from_csv(file.path())?;

        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.names, vec!["flag", "x"]);
        assert_eq!(dataset.types, vec![ValueType::Boolean, ValueType::Double]);
        assert_eq!(
            dataset.columns[0],
            vec![Value::Bool(true), Value::Bool(false), Value::Missing, Value::Bool(true)]
        );
        assert_eq!(
            dataset.columns[1],
            vec![Value::Num(1.5), Value::Missing, Value::Num(-2.0), Value::Num(4.0)]
        );
        assert_eq!(dataset.labels, vec![true, false, true, false]);
        assert_eq!(dataset.positive_rate(), 0.5);

        Ok(())
    }

    #[test]
    fn test_rejects_bad_rows() {
        assert!(Dataset::parse_csv("a,label\n1,2\n").is_err());
        assert!(Dataset::parse_csv("a,label\n1\n").is_err());
        assert!(Dataset::parse_csv("a,label\nfoo,1\n").is_err());
        assert!(Dataset::parse_csv("a,label\n").is_err());
        assert!(Dataset::parse_csv("").is_err());
    }

    #[test]
    fn test_mixed_column_rejected() {
        let result = Dataset::from_columns(
            vec!["a".to_string()],
            vec![vec![Value::Bool(true), Value::Num(1.0)]],
            vec![true, false],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_shuffle_determinism() -> anyhow::Result<()> {
        let file = create_test_csv()?;
        let mut ds1 = Dataset::from_csv(file.path())?;
        let mut ds2 = ds1.clone();

        ds1.shuffle(42);
        ds2.shuffle(42);
        assert_eq!(ds1, ds2);

        // Rows stay intact: the label still follows its example.
        let original = Dataset::from_csv(file.path())?;
        for example in 0..ds1.len() {
            let row = ds1.row(example);
            let source = (0..original.len())
                .find(|&i| original.row(i).iter().zip(&row).all(|(a, b)| a.same(b)))
                .unwrap();
            assert_eq!(original.labels[source], ds1.labels[example]);
        }

        Ok(())
    }

    #[test]
    fn test_split() -> anyhow::Result<()> {
        let file = create_test_csv()?;
        let dataset = Dataset::from_csv(file.path())?;

        let (train, valid) = dataset.split(0.25)?;
        assert_eq!(train.len(), 3);
        assert_eq!(valid.len(), 1);
        assert!(train.same_schema(&valid));
        assert_eq!(valid.labels, vec![false]);

        assert!(dataset.split(1.0).is_err());
        let (all, none) = dataset.split(0.0)?;
        assert_eq!(all.len(), 4);
        assert!(none.is_empty());

        Ok(())
    }
}
