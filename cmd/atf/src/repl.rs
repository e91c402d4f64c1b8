use atf_memcore::{DumpOptions, RemoteReader, evaluate};
use atf_reflect::ReflectionCatalogue;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// Interactive stdin loop: one MemCore expression per line, result (or `#error`) on
/// stdout. Exits on EOF/Ctrl-D/Ctrl-C, matching the teacher's debugger REPL shape.
pub fn run(
    catalogue: &ReflectionCatalogue,
    reader: &dyn RemoteReader,
    module_base: u64,
    base_address_expected: u64,
    dump_opts: DumpOptions,
) -> eyre::Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("atf ready. Type an expression, Ctrl-D to exit.");

    loop {
        match rl.readline("atf> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);
                let text = match evaluate(catalogue, reader, trimmed, module_base, base_address_expected, dump_opts.clone()) {
                    Ok(result) => result.into_text(dump_opts.json),
                    Err(e) => format!("#{e}"),
                };
                println!("{text}");
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }

    Ok(())
}
