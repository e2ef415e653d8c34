use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

/// Load the class-index to class-name table.
///
/// One name per line, line number = class index. Blank lines are skipped.
pub fn load_labels(filepath: &Path) -> io::Result<Vec<String>> {
    let file = File::open(filepath)?;
    let reader = io::BufReader::new(file);
    let mut labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        labels.push(name.to_string());
    }

    if labels.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("no class labels in {}", filepath.display()),
        ));
    }

    Ok(labels)
}
