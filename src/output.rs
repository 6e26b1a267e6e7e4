// src/output.rs

use crate::error::{LsaError, Result};
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::Builder;

/// Writes a file only once its complete content has been produced.
///
/// `write_body` streams into a temporary file created next to `path`; the
/// temporary file is renamed over `path` after a successful flush. If
/// `write_body` fails the temporary file is removed and `path` is untouched.
///
/// A replaced file keeps its permissions. A new file gets the usual
/// `0o666 & !umask` on unix, not the private mode of a temporary file.
pub fn write_atomically<P, F>(path: P, write_body: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let path = path.as_ref();
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let existing_permissions = fs::metadata(path).ok().map(|metadata| metadata.permissions());
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut temp_file = builder
        .tempfile_in(directory)
        .map_err(|e| LsaError::io(directory, e))?;
    if let Some(permissions) = existing_permissions {
        temp_file
            .as_file()
            .set_permissions(permissions)
            .map_err(|e| LsaError::io(path, e))?;
    }
    {
        let mut writer = BufWriter::new(temp_file.as_file_mut());
        write_body(&mut writer).map_err(|e| LsaError::io(path, e))?;
        writer.flush().map_err(|e| LsaError::io(path, e))?;
    }
    temp_file
        .persist(path)
        .map_err(|e| LsaError::io(path, e.error))?;
    Ok(())
}

/// Formats a float the way the matrix files store them: shortest round-trip
/// digits, with a trailing `.0` on integral values (`16.0`, `0.5`).
///
/// Decimal exponents outside `-4..16` switch to scientific notation with a
/// signed, two-digit exponent (`1e-05`, `1.5e+20`).
#[derive(Debug, Clone, Copy)]
pub struct FloatToken(pub f64);

impl fmt::Display for FloatToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0;
        if value.is_nan() {
            return f.write_str("nan");
        }
        if value.is_infinite() {
            return f.write_str(if value > 0.0 { "inf" } else { "-inf" });
        }
        if value == 0.0 {
            return write!(f, "{:.1}", value);
        }

        let scientific = format!("{:e}", value);
        let parts = scientific
            .split_once('e')
            .and_then(|(mantissa, exponent)| exponent.parse::<i32>().ok().map(|exponent| (mantissa, exponent)));
        match parts {
            Some((mantissa, exponent)) if !(-4..16).contains(&exponent) => {
                let sign = if exponent < 0 { '-' } else { '+' };
                write!(f, "{}e{}{:02}", mantissa, sign, exponent.abs())
            }
            _ if value.fract() == 0.0 => write!(f, "{:.1}", value),
            _ => write!(f, "{}", value),
        }
    }
}

/// Writes `values` as one line, each token followed by a single space.
pub(crate) fn write_value_line(out: &mut dyn Write, values: impl IntoIterator<Item = f64>) -> std::io::Result<()> {
    for value in values {
        write!(out, "{} ", FloatToken(value))?;
    }
    writeln!(out)
}

/// Writes `(index, value)` pairs as one line, each token followed by a single space.
pub(crate) fn write_pair_line(
    out: &mut dyn Write,
    pairs: impl IntoIterator<Item = (usize, f64)>,
) -> std::io::Result<()> {
    for (index, value) in pairs {
        write!(out, "{} {} ", index, FloatToken(value))?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn float_tokens_keep_a_decimal_point_for_integral_values() {
        assert_eq!(FloatToken(16.0).to_string(), "16.0");
        assert_eq!(FloatToken(-3.0).to_string(), "-3.0");
        assert_eq!(FloatToken(0.5).to_string(), "0.5");
        assert_eq!(FloatToken(0.1 + 0.2).to_string(), "0.30000000000000004");
        assert_eq!(FloatToken(-0.0).to_string(), "-0.0");
        assert_eq!(FloatToken(1e15).to_string(), "1000000000000000.0");
    }

    #[test]
    fn float_tokens_use_signed_two_digit_exponents_outside_the_decimal_range() {
        assert_eq!(FloatToken(0.0001).to_string(), "0.0001");
        assert_eq!(FloatToken(1e-5).to_string(), "1e-05");
        assert_eq!(FloatToken(-1.5e-7).to_string(), "-1.5e-07");
        assert_eq!(FloatToken(1e16).to_string(), "1e+16");
        assert_eq!(FloatToken(1.2345e20).to_string(), "1.2345e+20");
        assert_eq!(FloatToken(2.5e-300).to_string(), "2.5e-300");
        assert_eq!(FloatToken(f64::INFINITY).to_string(), "inf");
        assert_eq!(FloatToken(f64::NEG_INFINITY).to_string(), "-inf");
        assert_eq!(FloatToken(f64::NAN).to_string(), "nan");
    }

    #[test]
    fn float_tokens_read_back_exactly() {
        for value in [1e-5, 3.0e-12, 6.02214076e23, 0.1 + 0.2, -7.25, 1e16] {
            let token = FloatToken(value).to_string();
            assert_eq!(token.parse::<f64>().unwrap(), value, "{}", token);
        }
    }

    #[test]
    fn pair_and_value_lines_have_trailing_separator() {
        let mut buffer = Vec::new();
        write_pair_line(&mut buffer, vec![(0, 16.0), (1, 4.0)]).unwrap();
        write_value_line(&mut buffer, vec![1.5, 2.0]).unwrap();
        write_pair_line(&mut buffer, Vec::new()).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "0 16.0 1 4.0 \n1.5 2.0 \n\n");
    }

    #[test]
    fn atomic_write_replaces_target_only_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("matrix.txt");
        fs::write(&target, "old").unwrap();

        let failed = write_atomically(&target, |out| {
            out.write_all(b"partial")?;
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
        });
        assert!(matches!(failed, Err(LsaError::Io { .. })));
        assert_eq!(fs::read_to_string(&target).unwrap(), "old");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        write_atomically(&target, |out| out.write_all(b"new")).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn new_files_get_the_same_mode_as_plainly_created_files() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("reference");
        fs::File::create(&reference).unwrap();
        let target = dir.path().join("matrix.txt.3.LSA");

        write_atomically(&target, |out| out.write_all(b"1 1 1\n0 1.0 \n")).unwrap();
        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&target), mode(&reference));
    }

    #[cfg(unix)]
    #[test]
    fn replaced_files_keep_their_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("matrix.txt");
        fs::write(&target, "old").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o640)).unwrap();

        write_atomically(&target, |out| out.write_all(b"new")).unwrap();
        assert_eq!(fs::metadata(&target).unwrap().permissions().mode() & 0o777, 0o640);
    }
}
