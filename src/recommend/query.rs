use crate::context::ContextInterpretation;

/// Builds the catalog search string for an interpretation.
///
/// Mood and genre keywords come first, followed by an `artist:` filter for
/// the first artist. When the interpretation carries neither, the raw text is
/// searched together with the detected listening context.
pub fn build_query(text: &str, interpretation: &ContextInterpretation) -> String {
    let mut terms: Vec<String> = Vec::new();
    let keywords = interpretation
        .mood
        .iter()
        .chain(interpretation.genres.iter());
    for keyword in keywords {
        let keyword = keyword.trim();
        let folded = keyword.to_lowercase();
        if !keyword.is_empty() && !terms.iter().any(|t| t.to_lowercase() == folded) {
            terms.push(keyword.to_string());
        }
    }

    if let Some(artist) = interpretation.primary_artist() {
        let artist = artist.replace('"', "");
        let artist = artist.trim();
        if !artist.is_empty() {
            terms.push(format!("artist:\"{artist}\""));
        }
    }

    if !terms.is_empty() {
        return terms.join(" ");
    }

    match interpretation.context.as_deref() {
        Some(context) => format!("{} {}", text.trim(), context),
        None => text.trim().to_string(),
    }
}
