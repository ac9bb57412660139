//! Data-driven persona profile.
//!
//! Every keyword table, tone string and canned line the engine uses lives
//! here, so one engine can run any persona loaded from TOML. `Default` is
//! the built-in persona.

use crate::Mood;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// Profile
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaProfile {
    pub display_name: String,
    /// Names that address the agent in plain text.
    pub name_aliases: Vec<String>,
    /// `@handles` that resolve to the agent.
    pub handles: Vec<String>,
    pub completion_cues: CompletionCues,
    /// Minimal acknowledgements ("ok", "haan").
    pub quick_replies: Vec<String>,
    /// Conversation starters ("hi", "bhai", "oye").
    pub greeting_tokens: Vec<String>,
    /// Question words accepted by loose addressing.
    pub question_tokens: Vec<String>,
    pub farewell_patterns: Vec<String>,
    pub mood_markers: MoodMarkers,
    /// Ordered topic table; earlier entries win.
    pub topics: Vec<TopicKeywords>,
    /// Topics the agent cares about. Also the rotation pool for privileged senders.
    pub interests: Vec<String>,
    pub topic_change_triggers: Vec<String>,
    /// Phrases that end a privileged sender's topic session outright.
    pub end_indicators: Vec<String>,
    /// Whole-message brush-offs ("hmm", "busy now"); two in a row end the session.
    pub indirect_endings: Vec<String>,
    /// Whole-message one-word answers; a run of them ends the session.
    pub dry_responses: Vec<String>,
    pub sign_off_lines: Vec<String>,
    pub day_parts: Vec<DayPart>,
    pub privileged_profile: BehaviorProfile,
    /// Used when no day part covers the hour.
    pub neutral_profile: BehaviorProfile,
    pub sleepy_lines: Vec<String>,
    pub filler_lines: Vec<String>,
    pub night_filler: String,
    /// `{topic}` is substituted.
    pub conclusion_templates: Vec<String>,
    pub transition_lines: Vec<String>,
    /// `{topic}` is substituted.
    pub intro_templates: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionCues {
    pub acknowledgements: Vec<String>,
    pub questions: Vec<String>,
    pub greetings: Vec<String>,
}

impl CompletionCues {
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.acknowledgements
            .iter()
            .chain(self.questions.iter())
            .chain(self.greetings.iter())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodMarkers {
    pub happy: Vec<String>,
    pub angry: Vec<String>,
    pub sad: Vec<String>,
    pub excited: Vec<String>,
    pub bored: Vec<String>,
    pub toxic: Vec<String>,
}

impl MoodMarkers {
    /// Marker lists in tie-break order.
    pub fn ordered(&self) -> [(Mood, &[String]); 6] {
        [
            (Mood::Happy, self.happy.as_slice()),
            (Mood::Angry, self.angry.as_slice()),
            (Mood::Sad, self.sad.as_slice()),
            (Mood::Excited, self.excited.as_slice()),
            (Mood::Bored, self.bored.as_slice()),
            (Mood::Toxic, self.toxic.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicKeywords {
    pub name: String,
    pub keywords: Vec<String>,
}

/// Behavioral knobs for a slice of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorProfile {
    pub name: String,
    pub tone: String,
    pub chatting_style: String,
    /// 0-100
    pub energy: u8,
    /// 0-100+
    pub humor_level: u8,
    /// 0-100
    pub focus: u8,
    /// Added to the engagement probability before clamping.
    pub engagement_bias: f64,
    pub topics_of_interest: Vec<String>,
}

impl Default for BehaviorProfile {
    fn default() -> Self {
        Self {
            name: "neutral".to_string(),
            tone: "Calm and casual".to_string(),
            chatting_style: "Short, friendly replies".to_string(),
            energy: 50,
            humor_level: 50,
            focus: 50,
            engagement_bias: 0.0,
            topics_of_interest: Vec::new(),
        }
    }
}

/// A local-time hour range `[start_hour, end_hour)`, wrapping past midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPart {
    pub start_hour: u32,
    pub end_hour: u32,
    pub profile: BehaviorProfile,
}

impl DayPart {
    pub fn covers(&self, hour: u32) -> bool {
        hour_in_window(hour, self.start_hour, self.end_hour)
    }
}

/// `hour` lies in `[start, end)`; ranges with `start > end` wrap midnight.
pub fn hour_in_window(hour: u32, start: u32, end: u32) -> bool {
    match start.cmp(&end) {
        std::cmp::Ordering::Equal => false,
        std::cmp::Ordering::Less => hour >= start && hour < end,
        std::cmp::Ordering::Greater => hour >= start || hour < end,
    }
}

impl PersonaProfile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read persona file: {}", path.as_ref().display())
        })?;
        toml::from_str(&content).with_context(|| "Failed to parse persona TOML")
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(p) => p,
            Err(e) => {
                tracing::info!("Persona file not found or invalid ({}), using built-in persona", e);
                Self::default()
            }
        }
    }

    /// First day part covering the local hour.
    pub fn day_part_for_hour(&self, hour: u32) -> Option<&DayPart> {
        self.day_parts.iter().find(|p| p.covers(hour))
    }

    pub fn is_interest(&self, topic: &str) -> bool {
        self.interests.iter().any(|t| t.eq_ignore_ascii_case(topic))
    }

    pub fn has_topic(&self, name: &str) -> bool {
        self.topics.iter().any(|t| t.name.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// Built-in persona
// ============================================================================

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn topic(name: &str, keywords: &[&str]) -> TopicKeywords {
    TopicKeywords {
        name: name.to_string(),
        keywords: strings(keywords),
    }
}

#[allow(clippy::too_many_arguments)]
fn day_part(
    start_hour: u32,
    end_hour: u32,
    name: &str,
    tone: &str,
    chatting_style: &str,
    energy: u8,
    humor_level: u8,
    focus: u8,
    engagement_bias: f64,
    topics: &[&str],
) -> DayPart {
    DayPart {
        start_hour,
        end_hour,
        profile: BehaviorProfile {
            name: name.to_string(),
            tone: tone.to_string(),
            chatting_style: chatting_style.to_string(),
            energy,
            humor_level,
            focus,
            engagement_bias,
            topics_of_interest: strings(topics),
        },
    }
}

impl Default for PersonaProfile {
    fn default() -> Self {
        Self {
            display_name: "Avinash Patel".to_string(),
            name_aliases: strings(&["avinash", "avinash patel", "patel", "avii"]),
            handles: strings(&["@aviiiii_patel"]),
            completion_cues: CompletionCues {
                acknowledgements: strings(&["ok", "hmm", "achha", "bye", "acha"]),
                questions: strings(&["kya", "kaisa", "kaha", "why", "what", "how", "kese"]),
                greetings: strings(&["hi", "hello", "hey", "bhai"]),
            },
            quick_replies: strings(&["haan", "nahi", "ha", "hmm", "ok", "achha", "thik", "bilkul"]),
            greeting_tokens: strings(&["hi", "hello", "hey", "bhai", "sun", "bol", "are", "arey", "oye"]),
            question_tokens: strings(&["kya", "why", "how", "what", "when", "where", "who"]),
            farewell_patterns: strings(&[
                "bye", "byee", "byeee", "bye bye", "tata", "ta ta", "alvida", "phir milenge",
                "phir milte hai", "good night", "gn", "gud night", "good nyt", "subah milte hai",
                "sweet dreams", "shubh ratri", "chal nikal", "nikalta hu", "nikalta hoon",
                "chalta hu", "chalta hoon", "chalte hai", "bbye", "tc", "take care", "ttyl",
                "talk to you later", "catch you later", "cya", "see ya", "see you later",
                "ok bye", "okay bye", "bye everyone", "bye guys", "kal milte hai", "kal milenge",
                "baad me baat karte hai", "peace out", "gtg", "got to go", "signing off",
                "logging off", "bye for now", "khuda hafiz", "gotta bounce", "night night",
                "time to sleep", "sone ja rha", "sone chala", "aaj ke liye bye", "kal baat karenge",
                "chalo bye", "chalo gn", "leaving now", "talk soon", "see you soon",
            ]),
            mood_markers: MoodMarkers {
                happy: strings(&["😊", "😄", "😂", "haha", "lol", "lmao", "xd", ":)", "nice", "great", "awesome"]),
                angry: strings(&["😠", "😡", "wtf", "stfu", "fuck", "shit", "bc", "mc"]),
                sad: strings(&["😢", "😭", ":(", "sad", "sorry", "unfortunately"]),
                excited: strings(&["🔥", "💯", "omg", "wow", "amazing", "insane", "crazy"]),
                bored: strings(&["hmm", "ok", "okay", "k", "meh", "whatever"]),
                toxic: strings(&["noob", "loser", "stupid", "idiot", "useless"]),
            },
            topics: vec![
                topic("tech", &["coding", "gadgets", "software", "ai", "tech", "dev", "machine learning", "cybersecurity", "startup", "data science"]),
                topic("crypto", &["crypto", "bitcoin", "btc", "eth", "blockchain", "token", "nft", "defi", "web3", "trading", "mining", "hodl", "altcoin"]),
                topic("gaming", &["game", "gaming", "steam", "discord", "twitch", "xbox", "playstation", "nintendo", "fps", "mmorpg", "lol", "pubg", "esports"]),
                topic("memes", &["meme", "memes", "troll", "lmao", "kek", "based", "chad", "copypasta", "ratio", "cringe", "sus"]),
                topic("relationships", &["flirting", "single", "crush", "dating"]),
                topic("movies", &["movie", "tv_shows", "netflix", "anime", "manga", "kdrama", "series", "binge_watching", "streaming", "cinema"]),
                topic("music", &["spotify", "playlist", "rap", "hiphop", "rock", "pop", "concert", "album", "artist", "festival", "lyrics", "gaana", "bollywood songs"]),
                topic("celebrities", &["celebrity", "actor", "actress", "singer", "influencer", "youtube", "hollywood", "bollywood", "drama", "gossip"]),
                topic("food", &["food", "cuisine", "restaurant", "cooking", "recipe", "foodie", "dinner", "snacks", "drinks", "cocktails", "chai", "biryani", "street food"]),
                topic("fitness", &["gym", "workout", "fitness", "health", "nutrition", "diet", "exercise", "gains", "trainer", "bodybuilding"]),
                topic("humor", &["jokes", "funny", "comedy", "puns", "roast", "sarcasm", "humor", "witty", "comeback", "savage"]),
                topic("friends", &["party", "hangout", "social", "meetup", "gathering", "crew", "squad", "vibes"]),
                topic("politics", &["politics", "modi", "rahul", "gandhi", "election", "government", "neta"]),
                topic("sports", &["football", "basketball", "soccer", "nba", "fifa", "athlete", "sports", "cricket", "ipl", "championship", "tournament"]),
                topic("fashion", &["fashion", "style", "outfit", "brands", "streetwear", "luxury", "sneakers", "accessories", "shopping"]),
                topic("travel", &["travel", "vacation", "adventure", "destination", "wanderlust", "backpacking", "tourism", "trip", "goa trip"]),
            ],
            interests: strings(&["music", "gaming", "tech", "relationships", "movies", "humor", "crypto", "memes"]),
            topic_change_triggers: strings(&[
                "boring", "bored", "bore ho gaya", "bore ho raha", "not interesting", "bakwas",
                "faltu", "time waste", "same old", "kuch naya batao", "topic change karo",
                "kuch aur baat karte", "something else", "move on", "next topic", "aage badho",
                "ye topic chodo", "naya topic", "change the subject",
            ]),
            end_indicators: strings(&[
                "bye", "goodbye", "bye bye", "cya", "see you", "gtg", "got to go", "gotta go",
                "talk later", "ttyl", "catch you later", "peace out", "im out", "heading out",
                "leaving now", "good night", "gn", "until next time", "take care", "farewell",
                "signing off", "brb", "be right back", "afk", "chalta hu", "chalti hu", "alvida",
                "phir milenge", "milte hai", "baad me baat karte", "tata", "khuda hafiz",
                "allah hafiz", "chalo bye", "nikalta hu", "jaata hu", "jaana hai", "sona hai",
                "so raha hu",
            ]),
            indirect_endings: strings(&[
                "hmm", "hm", "mhm", "k", "kk", "ok", "okay", "achha", "acha", "thik", "thik hai",
                "cool", "fine", "alright", "sure", "got it", "i see", "oh", "busy now", "not now",
                "baad me", "abhi nahi", "thoda busy hu", "kaam hai", "dekhta hu", "maybe later",
                "dekhenge", "getting sleepy", "neend aa rahi", "thak gaya", "tired",
            ]),
            dry_responses: strings(&[
                "yes", "no", "maybe", "idk", "dunno", "nah", "nope", "yep", "yeah", "ha", "haan",
                "nahi", "na", "bilkul", "never", "kabhi nahi", "pata nahi", "no idea", "not sure",
                "kya pata", "dekhte hai", "jaane do", "whatever", "jo bhi", "kuch bhi",
                "theek hai", "chalo theek hai", "tumhari marzi",
            ]),
            sign_off_lines: strings(&[
                "Alright then, catch you later! Was fun chatting 😎",
                "Chal theek hai, baad me baat karte hain ✌️",
                "Okay okay, jaa. Kal continue karenge",
            ]),
            day_parts: vec![
                day_part(6, 9, "groggy", "Groggy and annoyed", "Irritable, short replies", 20, 90, 10, -0.05,
                    &["food"]),
                day_part(9, 12, "college", "Energetic, sarcastic and flirty", "Quick humorous jabs", 40, 120, 80, 0.05,
                    &["celebrities", "humor", "relationships"]),
                day_part(12, 15, "afternoon", "A little tired, up for talking", "Laid-back with sarcastic remarks", 40, 90, 40, 0.05,
                    &["humor", "celebrities"]),
                day_part(15, 19, "evening", "Relaxed, playful and energetic", "Spontaneous and playful", 70, 70, 75, 0.05,
                    &["fitness", "friends", "music"]),
                day_part(19, 22, "night", "Gaming, flirting and mocking", "Selective but chatty", 75, 90, 80, 0.05,
                    &["gaming", "movies", "humor", "relationships"]),
                day_part(22, 2, "late night", "Random chatter, winding down", "Slow replies, occasional roasts", 45, 80, 80, 0.0,
                    &["movies", "music"]),
                day_part(2, 6, "do not disturb", "Asleep", "Minimal or no responses", 0, 0, 0, -0.2, &[]),
            ],
            privileged_profile: BehaviorProfile {
                name: "close friend".to_string(),
                tone: "Hyped and attentive".to_string(),
                chatting_style: "Engaging, keeps the chat flowing".to_string(),
                energy: 90,
                humor_level: 100,
                focus: 90,
                engagement_bias: 0.1,
                topics_of_interest: strings(&["crypto", "tech", "gaming", "memes"]),
            },
            neutral_profile: BehaviorProfile::default(),
            sleepy_lines: strings(&[
                "Bhai main so raha hun... subah baat karte hain",
                "Zzz... subah tak wait karo yaar",
                "Abhi sleep mode mein hun... subah 6 baje ping karna",
                "Sone de yaar... subah milte hain",
                "Neend aa rahi hai... subah baat karenge",
            ]),
            filler_lines: strings(&["haan bhai", "hmm", "achha", "theek hai", "haan", "bol na", "batao", "k", "aur bata"]),
            night_filler: "hmm".to_string(),
            conclusion_templates: strings(&[
                "That's enough about {topic} for now, getting kinda stale",
                "Damn we really went deep into {topic} huh? Time for something fresh!",
                "Aight, {topic} was fun but I got something even better",
                "Not gonna lie, {topic} is cool but wait till you hear this",
            ]),
            transition_lines: strings(&[
                "Ye topic boring ho gaya, let's talk about something more interesting!",
                "Arre wait, you know what's even cooler?",
                "Speaking of that, I just remembered something epic!",
                "That reminds me of something way more fun!",
            ]),
            intro_templates: strings(&[
                "Bro you won't believe what's happening in {topic} these days!",
                "Aye check this out - what's your take on {topic}?",
                "Yooo, {topic} is absolutely wild right now! What do you think?",
                "Been meaning to ask - what's your opinion on {topic}?",
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping_windows() {
        assert!(hour_in_window(23, 22, 2));
        assert!(hour_in_window(1, 22, 2));
        assert!(!hour_in_window(2, 22, 2));
        assert!(hour_in_window(2, 2, 6));
        assert!(!hour_in_window(6, 2, 6));
        assert!(!hour_in_window(5, 4, 4));
    }

    #[test]
    fn test_default_day_parts_cover_the_clock() {
        let persona = PersonaProfile::default();
        for hour in 0..24 {
            assert!(persona.day_part_for_hour(hour).is_some(), "hour {hour} uncovered");
        }
        assert_eq!(persona.day_part_for_hour(3).map(|p| p.profile.name.as_str()), Some("do not disturb"));
        assert_eq!(persona.day_part_for_hour(23).map(|p| p.profile.name.as_str()), Some("late night"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let persona: PersonaProfile = toml::from_str(
            r#"
            display_name = "Meera"
            name_aliases = ["meera"]
            handles = ["@meera_bot"]
            "#,
        )
        .unwrap();
        assert_eq!(persona.display_name, "Meera");
        assert_eq!(persona.handles, vec!["@meera_bot"]);
        assert!(!persona.topics.is_empty());
        assert!(!persona.farewell_patterns.is_empty());
    }

    #[test]
    fn test_interest_lookup_is_case_insensitive() {
        let persona = PersonaProfile::default();
        assert!(persona.is_interest("Gaming"));
        assert!(!persona.is_interest("food"));
    }

    #[test]
    fn test_every_named_topic_has_a_keyword_table() {
        let persona = PersonaProfile::default();
        for name in &persona.interests {
            assert!(persona.has_topic(name), "interest {name} has no keyword table");
        }
        let profiles = persona
            .day_parts
            .iter()
            .map(|p| &p.profile)
            .chain(std::iter::once(&persona.privileged_profile));
        for profile in profiles {
            for name in &profile.topics_of_interest {
                assert!(persona.has_topic(name), "{}: {name} has no keyword table", profile.name);
            }
        }
    }

    #[test]
    fn test_lifecycle_vocabulary_is_present() {
        let persona = PersonaProfile::default();
        assert!(persona.end_indicators.iter().any(|p| p == "gtg"));
        assert!(persona.indirect_endings.iter().any(|p| p == "hmm"));
        assert!(persona.dry_responses.iter().any(|p| p == "haan"));
        assert!(!persona.sign_off_lines.is_empty());
    }
}
