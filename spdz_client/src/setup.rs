use std::{
    fs,
    path::{Path, PathBuf},
};

use num_bigint::BigUint;
use tracing::info;

use crate::{
    error::ConfigError,
    fields::{BinaryField, PrimeField, DEFAULT_GF2N_DEGREE},
};

/// Directory holding per-configuration preprocessing data of the engines.
pub const DEFAULT_PREP_ROOT: &str = "Player-Data";

/// Bit length of the prime the engines are set up with.
pub const DEFAULT_PRIME_BITS: u32 = 128;

/// File name of the field parameters inside the preprocessing directory.
pub const PARAMS_FILE_NAME: &str = "Params-Data";

/// Field parameters shared by the client and all computation parties.
#[derive(Clone, Debug)]
pub struct FieldParameters {
    pub prime: PrimeField,
    pub binary: BinaryField,
}

impl FieldParameters {
    /// Load parameters from setup artifact.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading params from: {}", path.display());
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse artifact contents: prime modulus followed by extension degree.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut tokens = contents.split_whitespace();

        let modulus = tokens
            .next()
            .ok_or_else(|| ConfigError::Malformed("missing prime modulus".into()))?;
        let modulus = BigUint::parse_bytes(modulus.as_bytes(), 10)
            .ok_or_else(|| ConfigError::Malformed(format!("invalid prime modulus {modulus:?}")))?;

        let degree = tokens
            .next()
            .ok_or_else(|| ConfigError::Malformed("missing extension degree".into()))?;
        let degree: u32 = degree
            .parse()
            .map_err(|_| ConfigError::Malformed(format!("invalid extension degree {degree:?}")))?;

        Ok(Self {
            prime: PrimeField::new(modulus)?,
            binary: BinaryField::new(degree)?,
        })
    }
}

/// Location of the setup artifact for given number of parties.
pub fn params_path(prep_root: impl AsRef<Path>, num_parties: usize) -> PathBuf {
    prep_root
        .as_ref()
        .join(format!(
            "{num_parties}-{DEFAULT_PRIME_BITS}-{DEFAULT_GF2N_DEGREE}"
        ))
        .join(PARAMS_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2^127 - 1.
    const PRIME_127: &str = "170141183460469231731687303715884105727";

    #[test]
    fn test_parse_valid_artifact() {
        let params = FieldParameters::parse(&format!("{PRIME_127}\n128\n")).unwrap();
        assert_eq!(params.prime.modulus().to_string(), PRIME_127);
        assert_eq!(params.binary.degree(), 128);
    }

    #[test]
    fn test_parse_malformed_artifacts() {
        let bad_degree = format!("{PRIME_127} x");
        for contents in ["", "   \n", "12ab 128", PRIME_127, bad_degree.as_str()] {
            assert!(
                matches!(
                    FieldParameters::parse(contents),
                    Err(ConfigError::Malformed(_))
                ),
                "{contents:?}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_invalid_fields() {
        assert!(matches!(
            FieldParameters::parse("100 128"),
            Err(ConfigError::InvalidModulus(_))
        ));
        assert!(matches!(
            FieldParameters::parse(&format!("{PRIME_127} 7")),
            Err(ConfigError::UnsupportedDegree(7))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("spdz-client-setup-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(PARAMS_FILE_NAME);
        fs::write(&path, format!("{PRIME_127} 64")).unwrap();

        let params = FieldParameters::load(&path).unwrap();
        assert_eq!(params.binary.degree(), 64);

        fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(
            FieldParameters::load(&path),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_params_path() {
        assert_eq!(
            params_path(DEFAULT_PREP_ROOT, 2),
            Path::new("Player-Data/2-128-128/Params-Data")
        );
    }
}
