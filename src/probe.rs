//! Diagnostic probe source emitter.
//!
//! Writes a self-contained C translation unit that is compiled, never
//! linked or run: its whole value is in which lines the compiler accepts
//! and which literal strings end up embedded in the object file. The outer
//! driver compiles it with the target toolchain and scans the output for
//! `INFO sizeof(...) = <digit>` markers, static-assert diagnostics, and
//! `<symbol> is defined` / `is not defined` strings, learning the
//! toolchain's primitive sizes and feature macros without ever invoking
//! the preprocessor separately.
//!
//! Sizes are encoded as a single ASCII digit (`'0' + sizeof(T)`), which is
//! wrong for any type of 10 bytes or more. Downstream scanners depend on
//! the exact string format, so the single-digit encoding is kept as is.

use std::path::Path;

use anyhow::{Context, Result};

/// Builtin types and portable short aliases probed for size, in emission
/// order. The duplicate `float` entry is part of the established output
/// and stays.
const SIZE_TYPES: &[&str] = &[
    "char",
    "signed char",
    "unsigned char",
    "short",
    "signed short",
    "unsigned short",
    "int",
    "signed int",
    "unsigned int",
    "long",
    "signed long",
    "unsigned long",
    "long long",
    "signed long long",
    "unsigned long long",
    "float",
    "double",
    "float",
    "long double",
    "i1",
    "i2",
    "i4",
    "u1",
    "u2",
    "u4",
    "i8",
    "u8",
    "f4",
    "f8",
];

/// Fixed-width aliases and their expected byte counts, in emission order.
const FIXED_WIDTH: &[(&str, u32)] = &[
    ("i1", 1),
    ("i2", 2),
    ("i4", 4),
    ("u1", 1),
    ("u2", 2),
    ("u4", 4),
    ("i8", 8),
    ("u8", 8),
    ("f4", 4),
    ("f8", 8),
];

/// Toolchain and architecture macros of interest. Duplicates are part of
/// the established output and stay.
const SYMBOLS: &[&str] = &[
    "__AVR32__",
    "__AVR_ARCH__",
    "dsPIC30",
    "__GNUC__",
    "__has_feature",
    "INT4_IS_LONG",
    "__INT64_TYPE__",
    "__INT8_TYPE__",
    "__llvm__",
    "_M_ARM_FP",
    "__MSP430__",
    "_MSV_VER",
    "__SDCC",
    "__SIZEOF_DOUBLE__",
    "__SIZEOF_FLOAT__",
    "__SIZEOF_SIZE_T__",
    "__TI_COMPILER_VERSION__",
    "__INT8_TYPE__",
    "__INT16_TYPE__",
    "__INT32_TYPE__",
    "__INT64_TYPE__",
    "__UINT8_TYPE__",
    "__UINT16_TYPE__",
    "__UINT32_TYPE__",
    "__UINT64_TYPE__",
    "HAS_FLOAT",
    "HAS_DOUBLE",
    "HAS_LONGLONG",
    "HAS_FLOAT_OVERRIDE",
    "HAS_DOUBLE_OVERRIDE",
    "HAS_LONGLONG_OVERRIDE",
];

/// Feature macro guarding a capability-gated alias, if any.
fn capability_gate(type_name: &str) -> Option<&'static str> {
    match type_name {
        "i8" | "u8" => Some("HAS_LONGLONG"),
        "f4" => Some("HAS_FLOAT"),
        "f8" => Some("HAS_DOUBLE"),
        _ => None,
    }
}

/// Write the probe translation unit to `path`.
pub fn write_probe_source(path: &Path) -> Result<()> {
    std::fs::write(path, render_probe_source())
        .with_context(|| format!("failed to write probe source: {}", path.display()))
}

/// Render the probe translation unit as a string.
pub fn render_probe_source() -> String {
    let mut out = String::new();
    out.push_str("#include \"types.h\"\n\n");

    // Size entries and symbol entries share one numbering sequence.
    let mut index = 0;

    for ty in SIZE_TYPES {
        index += 1;
        let spelled: Vec<String> = format!("INFO sizeof({ty}) = ")
            .chars()
            .map(|c| format!("'{c}'"))
            .collect();
        let line = format!(
            "char size_info_{index}[] = {{{}, '0'+sizeof({ty}), '\\n'}};\n",
            spelled.join(", ")
        );
        match capability_gate(ty) {
            Some(gate) => {
                out.push_str(&format!("#ifdef {gate}\n"));
                out.push_str(&line);
                out.push_str("#endif\n");
            }
            None => out.push_str(&line),
        }
    }

    for (ty, bytes) in FIXED_WIDTH {
        let assert = format!(
            "_Static_assert(sizeof({ty}) == {bytes}, \"INFO {ty} should have size {bytes}, is not correct\\n\");\n"
        );
        match capability_gate(ty) {
            Some(gate) => {
                out.push_str(&format!("#ifdef {gate}\n"));
                out.push_str(&assert);
                out.push_str("#endif\n");
            }
            None => out.push_str(&assert),
        }
    }

    for sym in SYMBOLS {
        index += 1;
        out.push_str(&format!("#ifdef {sym}\n"));
        out.push_str(&format!(
            "char sym_info_{index}[] = \"INFO {sym} is defined\\n\";\n"
        ));
        out.push_str("#else\n");
        out.push_str(&format!(
            "char sym_info_{index}[] = \"INFO {sym} is not defined\\n\";\n"
        ));
        out.push_str("#endif\n");
    }

    out
}
