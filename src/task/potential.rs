use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::error::ConfigError;

use super::Scalar;

/// Reads one potential curve per file.
///
/// Values are whitespace separated; lines starting with `#` are comments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PotentialFileLoader {
    pub file_names: Vec<PathBuf>,
}

impl PotentialFileLoader {
    pub fn new<P: Into<PathBuf>>(file_names: impl IntoIterator<Item = P>) -> Self {
        Self {
            file_names: file_names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn load<F: Scalar>(&self) -> anyhow::Result<Vec<Vec<F>>> {
        self.file_names
            .iter()
            .map(|path| -> anyhow::Result<Vec<F>> {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read potential file {}", path.display()))?;
                Ok(parse_potential(&text, path)?)
            })
            .collect()
    }
}

/// Parses the text of one potential file.
pub fn parse_potential<F: Scalar>(text: &str, path: &Path) -> Result<Vec<F>, ConfigError> {
    let mut values = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim_start();
        if line.starts_with('#') {
            continue;
        }
        for token in line.split_whitespace() {
            let value = F::parse(token).ok_or_else(|| ConfigError::InvalidPotentialValue {
                path: path.to_path_buf(),
                line: index + 1,
                token: token.to_string(),
            })?;
            values.push(value);
        }
    }
    Ok(values)
}

/// Parameters of one Morse potential curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorsePotentialConfig<F> {
    pub dissociation_energy: F,
    pub equilibrium_bond_distance: F,
    pub well_width: F,
    pub min_r: F,
    pub max_r: F,
    pub point_count: u32,
}

impl<F: Scalar> MorsePotentialConfig<F> {
    /// `De * (1 - exp(-a (r - re)))^2` at `point_count` points over `[min_r, max_r]`.
    pub fn generate(&self) -> Vec<F> {
        let de = self.dissociation_energy.to_f64();
        let re = self.equilibrium_bond_distance.to_f64();
        let a = self.well_width.to_f64();
        let min_r = self.min_r.to_f64();
        let max_r = self.max_r.to_f64();

        let step = if self.point_count > 1 {
            (max_r - min_r) / (self.point_count - 1) as f64
        } else {
            0.0
        };

        (0..self.point_count)
            .map(|i| {
                let r = min_r + step * i as f64;
                let x = 1.0 - (-a * (r - re)).exp();
                F::from_f64(de * x * x)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MorsePotentialGenerator<F> {
    pub configs: Vec<MorsePotentialConfig<F>>,
}

impl<F: Scalar> MorsePotentialGenerator<F> {
    pub fn new(configs: Vec<MorsePotentialConfig<F>>) -> Self {
        Self { configs }
    }

    pub fn load(&self) -> Vec<Vec<F>> {
        self.configs.iter().map(MorsePotentialConfig::generate).collect()
    }
}

/// Where a task's potential curves come from.
#[derive(Debug, Clone, PartialEq)]
pub enum PotentialSource<F> {
    FileLoader(PotentialFileLoader),
    MorseGenerator(MorsePotentialGenerator<F>),
}

impl<F: Scalar> PotentialSource<F> {
    /// Number of curves this source produces.
    pub fn len(&self) -> usize {
        match self {
            PotentialSource::FileLoader(loader) => loader.file_names.len(),
            PotentialSource::MorseGenerator(generator) => generator.configs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One curve per file or Morse configuration, in order.
    pub fn load(&self) -> anyhow::Result<Vec<Vec<F>>> {
        match self {
            PotentialSource::FileLoader(loader) => loader.load(),
            PotentialSource::MorseGenerator(generator) => Ok(generator.load()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn morse(point_count: u32) -> MorsePotentialConfig<f64> {
        MorsePotentialConfig {
            dissociation_energy: 2.0,
            equilibrium_bond_distance: 1.0,
            well_width: 1.5,
            min_r: 0.5,
            max_r: 3.0,
            point_count,
        }
    }

    #[test]
    fn morse_minimum_at_equilibrium() {
        let config = MorsePotentialConfig {
            min_r: 0.0,
            max_r: 2.0,
            ..morse(5)
        };
        let curve = config.generate();
        assert_eq!(curve.len(), 5);
        // r = 0.0, 0.5, 1.0, 1.5, 2.0
        assert!(curve[2].abs() < 1e-12);
        assert!(curve[0] > curve[1]);
        assert!(curve[4] > curve[3]);
        assert!(curve[4] < config.dissociation_energy);
    }

    #[test]
    fn morse_endpoints_inclusive() {
        let config = morse(11);
        let curve = config.generate();
        let expected = |r: f64| {
            let x = 1.0 - (-1.5 * (r - 1.0)).exp();
            2.0 * x * x
        };
        assert!((curve[0] - expected(0.5)).abs() < 1e-12);
        assert!((curve[10] - expected(3.0)).abs() < 1e-12);
    }

    #[test]
    fn morse_single_point_samples_min_r() {
        let curve = morse(1).generate();
        assert_eq!(curve.len(), 1);
        let x = 1.0 - (-1.5f64 * (0.5 - 1.0)).exp();
        assert!((curve[0] - 2.0 * x * x).abs() < 1e-12);
        assert!(morse(0).generate().is_empty());
    }

    #[test]
    fn morse_in_single_precision() {
        let config = MorsePotentialConfig::<f32> {
            dissociation_energy: 2.0,
            equilibrium_bond_distance: 1.0,
            well_width: 1.5,
            min_r: 0.5,
            max_r: 3.0,
            point_count: 4,
        };
        let source = PotentialSource::MorseGenerator(MorsePotentialGenerator::new(vec![
            config, config,
        ]));
        let curves = source.load().unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[0], curves[1]);
    }

    #[test]
    fn parse_skips_comments() {
        let text = "# r V(r)\n0.5 1.25\n  # indented comment\n\n2.0\t-3e-1\n";
        let values: Vec<f64> = parse_potential(text, Path::new("curve.txt")).unwrap();
        assert_eq!(values, vec![0.5, 1.25, 2.0, -0.3]);
    }

    #[test]
    fn parse_reports_bad_token() {
        let err = parse_potential::<f32>("1.0\n2.0 abc\n", Path::new("bad.txt")).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidPotentialValue {
                path: PathBuf::from("bad.txt"),
                line: 2,
                token: "abc".to_string(),
            }
        );
    }

    #[test]
    fn file_loader_reads_each_file() {
        let dir = std::env::temp_dir().join(format!("vibwa-potential-{}", fastrand::u64(..)));
        std::fs::create_dir_all(&dir).unwrap();
        let first = dir.join("a.txt");
        let second = dir.join("b.txt");
        std::fs::write(&first, "1 2 3\n").unwrap();
        std::fs::write(&second, "# empty\n4\n").unwrap();

        let loader = PotentialFileLoader::new([&first, &second]);
        let curves: Vec<Vec<f32>> = loader.load().unwrap();
        assert_eq!(curves, vec![vec![1.0, 2.0, 3.0], vec![4.0]]);

        let missing = PotentialFileLoader::new([dir.join("missing.txt")]);
        assert!(missing.load::<f32>().is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
