/// Builds the instruction sent alongside every frame. The vocabulary is listed
/// once, comma-separated, and nowhere else in the text.
pub fn build_prompt(vocabulary: &[&str]) -> String {
    format!(
        "EXPERT WASTE CLASSIFICATION TASK: Analyze the image and follow these STRICT guidelines:\n\
         \n\
         CLASSIFICATION REQUIREMENTS:\n\
         - SELECT EXACTLY ONE waste category from this PRECISE list: {}\n\
         - Base classification on VISUAL CHARACTERISTICS and MATERIAL COMPOSITION\n\
         - MOST SPECIFIC category takes precedence\n\
         - IGNORE context, focus SOLELY on the object's inherent waste type\n\
         \n\
         RESPONSE FORMAT (MANDATORY):\n\
         - FIRST LINE: Waste Category (ONE WORD)\n\
         - SECOND LINE: Concise, actionable disposal recommendation\n\
         - NO additional text, numbering, or explanatory content\n\
         - USE clear, professional language\n\
         - PRIORITIZE local, environmentally responsible disposal methods\n\
         \n\
         CRITICAL CONSTRAINTS:\n\
         - Maximum 10 words for category\n\
         - Maximum 40 words for disposal advice\n\
         - ZERO speculation or unnecessary details",
        vocabulary.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VALID_CATEGORIES;

    #[test]
    fn test_every_category_appears_exactly_once() {
        let prompt = build_prompt(&VALID_CATEGORIES);

        for category in VALID_CATEGORIES {
            assert_eq!(
                prompt.matches(category).count(),
                1,
                "{} should appear exactly once",
                category
            );
        }
    }

    #[test]
    fn test_categories_are_comma_joined_in_order() {
        let prompt = build_prompt(&VALID_CATEGORIES);
        let expected = "Recycling, Organic, Trash, Electronics, Miscellaneous, Plastic, Metal, \
                        Glass, Paper, Textiles, Batteries, Hazardous Waste, Food Waste, \
                        Bulky Waste, E-waste, Toxic Waste";

        assert!(prompt.contains(expected));
    }

    #[test]
    fn test_states_two_line_format() {
        let prompt = build_prompt(&VALID_CATEGORIES);

        assert!(prompt.contains("FIRST LINE"));
        assert!(prompt.contains("SECOND LINE"));
        assert!(prompt.contains("Maximum 10 words for category"));
        assert!(prompt.contains("Maximum 40 words for disposal advice"));
    }

    #[test]
    fn test_is_deterministic() {
        assert_eq!(build_prompt(&["A", "B"]), build_prompt(&["A", "B"]));
    }
}
