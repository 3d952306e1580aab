/// A display impl that is safe to put in logs, i.e. one that has had secrets
/// stripped out. Config structs implement this instead of `Display` so that
/// printing a config for diagnostic purposes can never become an accidental
/// credential leak later, even if a field is added that shouldn't be logged.
pub trait SafeDisplay {
    fn to_safe_string(&self) -> String;

    /// Same as `to_safe_string` but with every line indented two spaces,
    /// for embedding under a `field:\n` header in a parent's own output.
    fn to_safe_string_indented(&self) -> String {
        self.to_safe_string()
            .lines()
            .map(|line| format!("  {line}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
