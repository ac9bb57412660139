use crate::llm::GenerationRequest;
use rapport_core::{ResponseMode, AGENT_SENDER_ID};

pub struct PromptAssembler;

impl PromptAssembler {
    pub fn system_prompt(req: &GenerationRequest) -> String {
        let p = &req.profile;
        let mode = match req.mode {
            ResponseMode::Normal => "Reply naturally, in one or two short lines.",
            ResponseMode::Farewell => "They are leaving. Say a short goodbye.",
            ResponseMode::Sleepy => "You were just woken up. Reply half-asleep, very short.",
        };
        let interests = if p.topics_of_interest.is_empty() {
            String::new()
        } else {
            format!("\nRight now you like talking about: {}.", p.topics_of_interest.join(", "))
        };
        format!(
            "You are {name}, chatting in a group.\nMood: {tone}. Style: {style}.\n\
             Energy {energy}/100, humor {humor}, focus {focus}/100.{interests}\n\
             The room feels {mood}; the topic is {topic}.\n\
             Relationship with this person: level {rel}/5, trust {trust}/10{close}.\n\
             {mode}\nNever explain yourself, never add labels or formatting.",
            name = req.persona_name,
            tone = p.tone,
            style = p.chatting_style,
            energy = p.energy,
            humor = p.humor_level,
            focus = p.focus,
            interests = interests,
            mood = req.mood,
            topic = req.topic,
            rel = req.metrics.relationship_level,
            trust = req.metrics.trust_level,
            close = if req.privileged { ", a close friend" } else { "" },
            mode = mode,
        )
    }

    /// Recent history as a transcript, the agent's own lines labeled "You".
    pub fn transcript(req: &GenerationRequest) -> String {
        req.history
            .iter()
            .map(|e| {
                let who = if e.is_agent || e.sender_id == AGENT_SENDER_ID {
                    "You"
                } else {
                    e.sender_id.as_str()
                };
                format!("{}: {}", who, e.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
