//! Hand-authored dialogue corpus and the dialogue style catalogue.
//!
//! Both tables are static data: the corpus is the reference material the
//! style catalogue was distilled from, and the catalogue is what gets logged
//! alongside the collected dataset.
use serde::Serialize;

/// One line of reference dialogue.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DialogueRecord {
    pub character: &'static str,
    pub dialogue: &'static str,
    pub context: &'static str,
    pub style: &'static str,
}

/// Descriptive attributes of one dialogue style.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StylePattern {
    pub name: &'static str,
    pub characteristics: &'static [&'static str],
    pub sentence_structure: &'static str,
    pub personality: &'static str,
    pub examples: &'static [&'static str],
}

const AUTHENTIC_DIALOGUE: &[DialogueRecord] = &[
    DialogueRecord {
        character: "Dale Cooper",
        dialogue: "Diane ... 6:18 a.m., room 315, Great Northern Hotel up here in Twin Peaks. Slept pretty well. Non-smoking room. No tobacco smell. That's a nice consideration for the business traveller.",
        context: "morning_routine",
        style: "quirky_observational",
    },
    DialogueRecord {
        character: "Dale Cooper",
        dialogue: "You know, this is, excuse me, a damn good cup of coffee. I've had I can't tell you how many cups of coffee I've had in my life and this ... this is one of the best.",
        context: "hotel_dining",
        style: "quirky_observational",
    },
    DialogueRecord {
        character: "Sheriff Truman",
        dialogue: "How you girls doin' this morning? Sounds like you got plenty to talk about today. Hope it's good news.",
        context: "feeding_chickens",
        style: "straightforward_caring",
    },
    DialogueRecord {
        character: "Lucy Moran",
        dialogue: "I'm ordering extra jelly donuts because they're Agent Cooper's favorite, you know my aunt I told you about with the raccoons? She liked jelly donuts, they were her favorite, but she doesn't remind me at all of Agent Cooper.",
        context: "donut_shop",
        style: "rambling_helpful",
    },
    DialogueRecord {
        character: "Audrey Horne",
        dialogue: "My name is Audrey Horne. You know, sometimes I get so flushed ... it's interesting.",
        context: "hotel_encounter",
        style: "mysterious_flirtatious",
    },
    DialogueRecord {
        character: "Dale Cooper",
        dialogue: "Miss Horne, unless I miss my guess, your father is Benjamin Horne, the owner of this fine establishment, so I guess you can sit anywhere you like. And I'd also like to add it would be my pleasure.",
        context: "investigation_politeness",
        style: "quirky_observational",
    },
    DialogueRecord {
        character: "Benjamin Horne",
        dialogue: "What the hell are you so happy about? We've got a tottering empire on our hands.",
        context: "business_stress",
        style: "authoritative_worried",
    },
    DialogueRecord {
        character: "Dr. Hayward",
        dialogue: "I don't believe I know your parents, James. Hope you're hungry, James. Eileen's been cooking up a storm.",
        context: "family_dinner",
        style: "polite_paternal",
    },
];

const CATALOGUE: &[StylePattern] = &[
    StylePattern {
        name: "quirky_observational",
        characteristics: &["Diane", "damn fine", "detailed observations", "tape recorder notes"],
        sentence_structure: "Long, methodical observations with specific details",
        personality: "Enthusiastic, methodical, quirky, coffee-obsessed",
        examples: &["Non-smoking room. No tobacco smell. That's a nice consideration"],
    },
    StylePattern {
        name: "straightforward_caring",
        characteristics: &["How you girls doin'", "Hope it's good news", "simple care"],
        sentence_structure: "Simple, direct, caring questions",
        personality: "Protective, honest, dutiful, kind to animals",
        examples: &["How you girls doin' this morning?"],
    },
    StylePattern {
        name: "rambling_helpful",
        characteristics: &["long tangents", "family stories", "helpful intent"],
        sentence_structure: "Stream of consciousness, helpful but meandering",
        personality: "Well-meaning, scattered, oversharing",
        examples: &["you know my aunt I told you about with the raccoons?"],
    },
    StylePattern {
        name: "mysterious_flirtatious",
        characteristics: &["cryptic statements", "I get so flushed", "interesting"],
        sentence_structure: "Short, mysterious, suggestive",
        personality: "Enigmatic, alluring, unpredictable",
        examples: &["You know, sometimes I get so flushed ... it's interesting"],
    },
    StylePattern {
        name: "authoritative_worried",
        characteristics: &["What the hell", "tottering empire", "business concerns"],
        sentence_structure: "Blunt, stressed, authoritative",
        personality: "Powerful, stressed, direct",
        examples: &["We've got a tottering empire on our hands"],
    },
    StylePattern {
        name: "polite_paternal",
        characteristics: &["Hope you're hungry", "formal politeness", "caring host"],
        sentence_structure: "Polite, welcoming, paternal",
        personality: "Caring, formal, responsible",
        examples: &["Hope you're hungry, James. Eileen's been cooking up a storm"],
    },
];

/// The reference dialogue lines, in authoring order.
pub fn authentic_dialogue() -> &'static [DialogueRecord] {
    AUTHENTIC_DIALOGUE
}

/// The style catalogue, in declaration order.
pub fn catalogue() -> &'static [StylePattern] {
    CATALOGUE
}

pub fn pattern(name: &str) -> Option<&'static StylePattern> {
    CATALOGUE.iter().find(|pattern| pattern.name == name)
}

pub fn style_names() -> Vec<&'static str> {
    CATALOGUE.iter().map(|pattern| pattern.name).collect()
}
