use crate::types::errors::Error;
use std::io::Write;
use std::path::Path;

/// Read a UTF-8 file, naming the file in the error
pub fn read_text(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read '{}': {}", path.display(), e),
        ))
    })
}

/// Write the remapped document to a file, or to stdout when no path is given
pub fn write_output(output: Option<&Path>, document: &str) -> Result<(), Error> {
    match output {
        Some(path) => std::fs::write(path, document).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write '{}': {}", path.display(), e),
            ))
        }),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(document.as_bytes())?;
            stdout.write_all(b"\n")?;
            Ok(())
        }
    }
}
