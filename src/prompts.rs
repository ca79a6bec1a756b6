//! Prompt text sent to Gemini. Everything here is a pure string builder.

use crate::models::DesignRequest;

/// Stylistic fragments cycled across variations, in order.
pub fn default_variations() -> Vec<String> {
    [
        "Modern block architecture, large tempered glass panels, wide balconies, marble-clad facade.",
        "Minimalist style, decorative sun-shading louvres, refined exterior lighting.",
        "Green architecture, ventilation bricks, balconies full of plants, bright natural light.",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Picks the fragment for `index`, wrapping around the list.
pub fn variation_fragment(variations: &[String], index: usize) -> &str {
    if variations.is_empty() {
        return "";
    }
    &variations[index % variations.len()]
}

pub fn build_design_prompt(
    request: &DesignRequest,
    index: usize,
    variations: &[String],
    aspect_ratio: &str,
) -> String {
    let fragment = variation_fragment(variations, index);
    format!(
        "FULL-VIEW ARCHITECTURAL DESIGN {aspect_ratio} (OPTION {option}):\n\
         - Empty plot: {width}m x {length}m.\n\
         - Building: {house_type}, {floors} floors, {style} style.\n\
         - RULES: Show the whole building from foundation to roof ridge. No cropping. Wide-angle shot.\n\
         - SETBACK: {front_yard}m front yard.\n\
         - DETAIL: 8K photorealistic, crisp materials.\n\
         - NOTE: {fragment}",
        option = index + 1,
        width = request.land_width,
        length = request.land_length,
        house_type = request.house_type,
        floors = request.floors,
        style = request.style,
        front_yard = request.front_yard,
    )
}

pub fn build_edit_prompt(instruction: &str, aspect_ratio: &str) -> String {
    format!(
        "ARCHITECTURAL EDIT: {instruction}. Keep the {aspect_ratio} aspect ratio and the same framing; \
         the roof must stay fully in frame."
    )
}

pub fn build_feng_shui_prompt(birth_date: &str, target_year: i32, language: &str) -> String {
    let (next, after) = (target_year + 1, target_year + 2);
    format!(
        "You are a senior feng shui master specialising in residential architecture.\n\
         The client's date of birth is: {birth_date}.\n\
         Give an in-depth analysis for building a house from {target_year} onwards:\n\
         1. Determine the client's element (Metal, Wood, Water, Fire, Earth) and explain why it matters for the vitality of the new house.\n\
         2. Analyse {target_year} and the following years ({next}, {after}) in detail. Check whether the client's age falls under Kim Lâu, Hoang Ốc or Tam Tai in any of these years.\n\
         3. Propose 3 highly auspicious times to break ground in {target_year} (solar date with the matching lunar date). \
         If {target_year} is unfavourable, propose the nearest good year to start instead.\n\
         4. Advise on the main house orientation or the colours that suit the client's element to attract prosperity from {target_year}.\n\n\
         REQUIREMENTS: Answer in {language}, in the formal, authoritative voice of a feng shui master. \
         Use a few tasteful emoji. Keep it concise and professional, about 250-300 words."
    )
}
