use ideo_core::{ReferenceRecord, TemplateVariant};

/// System instruction sent with every generation, whatever the template.
pub const ROLE_FRAMING: &str = "Tu es un expert YouTube très concis et percutant.";

const REFERENCES_SLOT: &str = "{references}";

/// Instruction text for one template variant. `instructions` holds exactly one
/// `{references}` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub id: &'static str,
    pub instructions: &'static str,
}

const DIRECT_TOPIC: Template = Template {
    id: "direct-topic",
    instructions: "\
Tu es un expert en stratégie YouTube. Voici des titres de vidéos qui ont bien fonctionné récemment :

{references}

Ta mission est de proposer UN SEUL sujet de vidéo, en français, ultra pertinent pour un YouTuber français. Ce sujet peut être :

- Une reprise intelligente d’un de ces titres
- Une fusion de plusieurs
- Une adaptation au marché français
- Ou une petite variation qui a de grandes chances de percer

Ta réponse doit être courte : uniquement le titre proposé, sans explication.",
};

const US_TREND_ADAPTATION: Template = Template {
    id: "us-trend-adaptation",
    instructions: "\
Tu es un expert en stratégie YouTube qui surveille les tendances américaines. Voici des vidéos qui cartonnent actuellement aux États-Unis :

{references}

Ta mission est d’adapter UNE de ces tendances au public français. Le sujet doit rester fidèle à ce qui fait le succès de la vidéo d’origine, tout en parlant à un spectateur français (références culturelles, prix en euros, contexte local).

Exemple de transformation : « I Tried Every Fast Food Burger in America » devient « J’ai testé tous les burgers des fast-foods français ».

Ta réponse doit être courte : uniquement le titre proposé, sans explication.",
};

const NARRATIVE_PERSONAL: Template = Template {
    id: "narrative-personal",
    instructions: "\
Tu es un expert en stratégie YouTube spécialisé dans le storytelling. Voici des titres de vidéos qui ont bien fonctionné récemment :

{references}

Ta mission est de proposer UN SEUL titre de vidéo, en français, raconté à la première personne, qui transforme l’un de ces sujets en histoire vécue. Le titre doit donner envie de connaître la suite.

Exemples du ton attendu : « J’ai vécu 7 jours sans téléphone », « Pourquoi j’ai tout quitté pour devenir boulanger ».

Ta réponse doit être courte : uniquement le titre proposé, sans explication.",
};

pub fn template(variant: TemplateVariant) -> &'static Template {
    match variant {
        TemplateVariant::DirectTopic => &DIRECT_TOPIC,
        TemplateVariant::UsTrendAdaptation => &US_TREND_ADAPTATION,
        TemplateVariant::NarrativePersonal => &NARRATIVE_PERSONAL,
    }
}

/// Format references as a bullet list, one per line, in the given order.
pub fn reference_block(references: &[ReferenceRecord]) -> String {
    let mut out = String::with_capacity(references.len() * 48);
    for (i, reference) in references.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str("- ");
        out.push_str(&reference.title);
        if let Some(label) = reference.label.as_deref().filter(|l| !l.is_empty()) {
            out.push_str(" (");
            out.push_str(label);
            out.push(')');
        }
    }
    out
}

/// Render the user prompt. Deterministic: same template and same ordered
/// references always give the same bytes.
pub fn render(template: &Template, references: &[ReferenceRecord]) -> String {
    template
        .instructions
        .replacen(REFERENCES_SLOT, &reference_block(references), 1)
        .trim()
        .to_string()
}
