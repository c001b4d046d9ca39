#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Keep inputs short; the parser is recursive.
    if data.len() > 4096 {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(expr) = vbsel_io::CompiledExpr::compile(text) {
        let row = vec![1.0; expr.variables().len()];
        let _ = expr.eval_row(&row);
    }
});
