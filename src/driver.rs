//! Pipeline driver: synthesize the integer-width prologue, run the
//! preprocessor and parser, then rewrite, rename and print.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

use lang_c::driver::{self, Config};

use crate::emit;
use crate::error::{Error, Result};
use crate::lower;
use crate::rename;
use crate::rewrite;

/// The width list names these types, in order.
const WIDTH_KEYWORDS: [&str; 5] = ["char", "short", "int", "long", "long long"];

/// Parse the `bits` argument: comma-separated widths of
/// `char, short, int, long, long long`.
pub fn parse_bits(bits: &str) -> Result<Vec<u32>> {
    let mut widths = Vec::new();
    for part in bits.split(',') {
        let w: u32 = part
            .trim()
            .parse()
            .map_err(|_| Error::InvalidWidths(format!("'{}' is not a width", part)))?;
        widths.push(w);
    }
    if widths.len() != WIDTH_KEYWORDS.len() {
        return Err(Error::InvalidWidths(format!(
            "expected {} widths, got {}",
            WIDTH_KEYWORDS.len(),
            widths.len()
        )));
    }
    Ok(widths)
}

/// The `uintN_t`/`intN_t`/`UINTN_C` prologue prepended before
/// preprocessing. The first type of a matching width wins; pointer-sized
/// types follow the last width entry.
pub fn inttype_prologue(widths: &[u32]) -> Result<String> {
    let mut out = String::new();
    for &bits in &[8u32, 16, 32, 64] {
        let idx = widths.iter().position(|&w| w == bits).ok_or_else(|| {
            Error::InvalidWidths(format!("no integer type is {} bits wide", bits))
        })?;
        let kw = WIDTH_KEYWORDS[idx];
        out.push_str(&format!("#define uint{}_t unsigned {}\n", bits, kw));
        out.push_str(&format!("#define int{}_t signed {}\n", bits, kw));
        let suffix = match idx {
            3 => "ul",
            4 => "ull",
            _ => "u",
        };
        out.push_str(&format!("#define UINT{}_C(c) c##{}\n", bits, suffix));
    }
    let last = widths[widths.len() - 1];
    let idx = widths
        .iter()
        .position(|&w| w == last)
        .unwrap_or(widths.len() - 1);
    let kw = WIDTH_KEYWORDS[idx];
    out.push_str(&format!("#define uintptr_t unsigned {}\n", kw));
    out.push_str(&format!("#define intptr_t signed {}\n", kw));
    Ok(out)
}

/// Minify an already-parsed translation unit.
pub fn minify_unit(unit: &lang_c::ast::TranslationUnit) -> Result<String> {
    let mut ast = lower::lower_unit(unit)?;
    rewrite::rewrite(&mut ast);
    rename::rename(&mut ast)?;
    Ok(emit::to_c(&ast, true))
}

/// Minify preprocessed source text. Test entry point; no preprocessor is
/// involved.
pub fn minify_preprocessed(source: &str) -> Result<String> {
    let parse = driver::parse_preprocessed(&Config::with_gcc(), source.to_string())
        .map_err(|e| convert_parse_error(driver::Error::SyntaxError(e)))?;
    minify_unit(&parse.unit)
}

/// The whole tool: read, preprocess, minify, write. When `output` already
/// exists and is newer than `input`, nothing is done.
pub fn run(bits: &str, input: &Path, output: Option<&Path>) -> Result<()> {
    if let Some(out) = output {
        if let (Some(time_in), Some(time_out)) = (mtime(input), mtime(out)) {
            if time_in < time_out {
                log::debug!("{} is newer than {}, nothing to do", out.display(), input.display());
                return Ok(());
            }
        }
    }

    let code = fs::read_to_string(input)?;
    let widths = parse_bits(bits)?;
    let prologue = inttype_prologue(&widths)?;

    // The preprocessor wants a file; hand it the prologue and the program
    // as one temporary unit, with the input's directory on the include
    // path.
    let mut tmp = tempfile::Builder::new()
        .prefix("cmin")
        .suffix(".c")
        .tempfile()?;
    tmp.write_all(prologue.as_bytes())?;
    tmp.write_all(code.as_bytes())?;
    tmp.flush()?;

    let mut config = Config::with_gcc();
    if let Some(dir) = input.parent() {
        if !dir.as_os_str().is_empty() {
            config.cpp_options.push("-I".to_string());
            config.cpp_options.push(dir.display().to_string());
        }
    }
    let parse = driver::parse(&config, tmp.path()).map_err(convert_parse_error)?;
    log::debug!("preprocessed to {} bytes", parse.source.len());

    let text = minify_unit(&parse.unit)?;
    match output {
        Some(path) => fs::write(path, text)?,
        None => print!("{}", text),
    }
    Ok(())
}

fn convert_parse_error(e: driver::Error) -> Error {
    match e {
        driver::Error::PreprocessorError(e) => Error::Preprocessor(e.to_string()),
        driver::Error::SyntaxError(e) => Error::Parse(e.to_string()),
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok()?.modified().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn prologue_picks_the_first_matching_width() {
        let p = inttype_prologue(&[8, 16, 32, 64, 64]).unwrap();
        assert!(p.contains("#define uint8_t unsigned char\n"));
        assert!(p.contains("#define int16_t signed short\n"));
        assert!(p.contains("#define UINT32_C(c) c##u\n"));
        // 64 first matches `long`, so the constant suffix is `ul`.
        assert!(p.contains("#define uint64_t unsigned long\n"));
        assert!(p.contains("#define UINT64_C(c) c##ul\n"));
        assert!(p.contains("#define uintptr_t unsigned long\n"));
        assert!(p.contains("#define intptr_t signed long\n"));
    }

    #[test]
    fn prologue_spells_long_long_out() {
        let p = inttype_prologue(&[8, 16, 32, 32, 64]).unwrap();
        assert!(p.contains("#define uint64_t unsigned long long\n"));
        assert!(p.contains("#define UINT64_C(c) c##ull\n"));
        assert!(p.contains("#define uintptr_t unsigned long long\n"));
    }

    #[test]
    fn width_list_is_validated() {
        assert_eq!(parse_bits("8,16,32,64,64").unwrap(), vec![8, 16, 32, 64, 64]);
        assert!(matches!(parse_bits("8,16,32"), Err(Error::InvalidWidths(_))));
        assert!(matches!(parse_bits("8,x,32,64,64"), Err(Error::InvalidWidths(_))));
        // A width list without a 16-bit type cannot satisfy the prologue.
        assert!(matches!(
            inttype_prologue(&[8, 32, 32, 64, 64]),
            Err(Error::InvalidWidths(_))
        ));
    }
}
