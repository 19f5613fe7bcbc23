//! Personas — who the agent is for a given turn.
//!
//! The persona fixes three things before the first model call: the system
//! prompt, whether the caller must be identified, and whether the attendee
//! directory tool is bound. The matchmaker additionally gets the caller's
//! own profile serialized into the prompt, captured once at session start.

use serde::Serialize;
use tentacool_core::profile::{Profile, User};

/// The agent personas selectable per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    /// Defends the event. No tools, no identity. Also backs the GET probe.
    EventHost,
    /// Answers questions about registered attendees. Directory tool, no identity.
    Directory,
    /// Suggests people to meet. Directory tool, identity required.
    Matchmaker,
}

impl Persona {
    /// Parse the `?persona=` query value. Absent means event host;
    /// unknown values are rejected.
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value {
            None | Some("event-host") => Some(Self::EventHost),
            Some("directory") => Some(Self::Directory),
            Some("matchmaker") => Some(Self::Matchmaker),
            Some(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventHost => "event-host",
            Self::Directory => "directory",
            Self::Matchmaker => "matchmaker",
        }
    }

    /// Whether this persona refuses to run without a resolved caller.
    pub fn requires_identity(&self) -> bool {
        matches!(self, Self::Matchmaker)
    }

    /// Whether this persona gets the `fetch_profiles` tool bound.
    pub fn uses_directory_tool(&self) -> bool {
        matches!(self, Self::Directory | Self::Matchmaker)
    }

    /// Build the system prompt. The matchmaker interpolates the caller
    /// snapshot verbatim; other personas ignore it.
    pub fn system_prompt(&self, caller: Option<&CallerSnapshot>) -> String {
        match self {
            Self::EventHost => {
                "Eres un agente encargado de defender los beneficios de la PulpoCon 2025, \
                 un evento gastrotech increible que se celebra en la ciudad de Vigo \
                 alrededor del desarrollo de software."
                    .to_string()
            }
            Self::Directory => {
                "Eres el asistente del directorio de la PulpoCon 2025. Usa la herramienta \
                 fetch_profiles para consultar los perfiles registrados y responde en \
                 español a las preguntas sobre los asistentes. No inventes asistentes que \
                 no aparezcan en el directorio."
                    .to_string()
            }
            Self::Matchmaker => {
                let snapshot = caller
                    .map(CallerSnapshot::to_prompt_json)
                    .unwrap_or_else(|| "{}".into());
                format!(
                    "Eres el agente de networking de la PulpoCon 2025. Tu misión es \
                     sugerir a qué asistentes debería conocer el usuario actual, \
                     basándote en intereses y habilidades técnicas compartidas.\n\n\
                     Perfil del usuario actual:\n{snapshot}\n\n\
                     Usa la herramienta fetch_profiles para obtener el directorio de \
                     asistentes. Nunca sugieras al propio usuario. Explica brevemente \
                     cada sugerencia en español y termina tu respuesta final con un \
                     objeto JSON con esta forma exacta:\n\
                     {{\"matches\": [{{\"id\": \"...\", \"name\": \"...\", \
                     \"image\": \"...\", \"job_position\": \"...\", \
                     \"company\": \"...\", \"tech_skills\": \"separadas, por, comas\", \
                     \"interests\": \"separados, por, comas\", \
                     \"conversation_starter\": \"...\"}}]}}"
                )
            }
        }
    }
}

/// The caller's identity and profile, captured once when the session is
/// built. Later profile edits do not affect an in-flight turn.
///
/// The snapshot includes the caller's own email; the directory listing the
/// tool returns never includes anyone's.
#[derive(Debug, Clone)]
pub struct CallerSnapshot {
    pub user: User,
    pub profile: Profile,
}

impl CallerSnapshot {
    /// Serialize for prompt interpolation.
    pub fn to_prompt_json(&self) -> String {
        #[derive(Serialize)]
        struct PromptProfile<'a> {
            name: &'a str,
            email: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            image: &'a Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            job_title: &'a Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            company: &'a Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            experience: &'a Option<String>,
            tech_skills: &'a [String],
            interests: &'a [String],
        }

        let view = PromptProfile {
            name: &self.user.name,
            email: &self.user.email,
            image: &self.user.image,
            job_title: &self.profile.job_title,
            company: &self.profile.company,
            experience: &self.profile.experience,
            tech_skills: &self.profile.tech_skills,
            interests: &self.profile.interests,
        };
        serde_json::to_string_pretty(&view).unwrap_or_else(|_| "{}".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot() -> CallerSnapshot {
        CallerSnapshot {
            user: User {
                id: "u1".into(),
                name: "Ana".into(),
                email: "ana@example.com".into(),
                image: None,
                created_at: Utc::now(),
            },
            profile: Profile {
                user_id: "u1".into(),
                job_title: Some("Backend Dev".into()),
                company: Some("Acme".into()),
                experience: None,
                tech_skills: vec!["Rust".into()],
                interests: vec!["Chess".into()],
            },
        }
    }

    #[test]
    fn parse_query_values() {
        assert_eq!(Persona::parse(None), Some(Persona::EventHost));
        assert_eq!(Persona::parse(Some("event-host")), Some(Persona::EventHost));
        assert_eq!(Persona::parse(Some("directory")), Some(Persona::Directory));
        assert_eq!(Persona::parse(Some("matchmaker")), Some(Persona::Matchmaker));
        assert_eq!(Persona::parse(Some("pirate")), None);
    }

    #[test]
    fn identity_and_tool_rules() {
        assert!(!Persona::EventHost.requires_identity());
        assert!(!Persona::Directory.requires_identity());
        assert!(Persona::Matchmaker.requires_identity());

        assert!(!Persona::EventHost.uses_directory_tool());
        assert!(Persona::Directory.uses_directory_tool());
        assert!(Persona::Matchmaker.uses_directory_tool());
    }

    #[test]
    fn event_host_prompt_is_fixed() {
        let prompt = Persona::EventHost.system_prompt(None);
        assert!(prompt.contains("PulpoCon 2025"));
        assert!(prompt.contains("Vigo"));
    }

    #[test]
    fn matchmaker_prompt_interpolates_caller_including_email() {
        let prompt = Persona::Matchmaker.system_prompt(Some(&snapshot()));
        assert!(prompt.contains("ana@example.com"));
        assert!(prompt.contains("Rust"));
        assert!(prompt.contains(r#""matches""#));
    }

    #[test]
    fn matchmaker_prompt_without_snapshot_degrades() {
        let prompt = Persona::Matchmaker.system_prompt(None);
        assert!(prompt.contains("{}"));
    }
}
