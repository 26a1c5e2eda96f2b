//! Shared generators for the ed-script benchmarks.

/// Generate a well-formed ed script with `commands` alternating add,
/// change and delete commands spread over a large file.
pub fn generate_script(commands: usize) -> String {
    let mut out = String::new();
    for i in 0..commands {
        let line = i * 10 + 1;
        match i % 3 {
            0 => {
                out.push_str(&format!("{line}a\ninserted line one\ninserted line two\n.\n"));
            }
            1 => {
                out.push_str(&format!("{},{}c\nreplacement line\n.\n", line, line + 2));
            }
            _ => {
                out.push_str(&format!("{},{}d\n", line, line + 1));
            }
        }
    }
    out
}
