//! Recognition patterns for narrated tool calls and failure apologies

use once_cell::sync::Lazy;
use regex::Regex;

/// One family of phrasings that announce a tool call
///
/// Capture group `name` holds the tool name and group `open` the opening
/// brace of the JSON arguments.
pub(crate) struct PatternFamily {
    pub label: &'static str,
    pub regex: &'static Lazy<Regex>,
    /// Whether a `)` right after the arguments belongs to the mention
    pub closes_paren: bool,
}

static SPANISH_NARRATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:uso|usaré|usare|utilizo|utilizaré|utilizare|voy a usar|voy a utilizar|usando|utilizando|llamo a|llamaré a|ejecuto|ejecutaré|invoco)\s+(?:la\s+)?herramienta\s+[`"']?(?P<name>[A-Za-z_][A-Za-z0-9_\-]*)[`"']?\s+con\s+(?:los\s+)?(?:argumentos|parámetros|parametros)\s*:?\s*(?P<open>\{)"#,
    )
    .expect("spanish narrative pattern")
});

static ENGLISH_NARRATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:using|use|calling|call|invoking|invoke|running|run)\s+(?:the\s+)?tool\s+[`"']?(?P<name>[A-Za-z_][A-Za-z0-9_\-]*)[`"']?\s+with\s+(?:the\s+)?(?:arguments|args|parameters|params|input)\s*:?\s*(?P<open>\{)"#,
    )
    .expect("english narrative pattern")
});

static CALL_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*\(\s*(?P<open>\{)"#)
        .expect("call syntax pattern")
});

/// Families in priority order
pub(crate) static FAMILIES: [PatternFamily; 3] = [
    PatternFamily {
        label: "spanish-narrative",
        regex: &SPANISH_NARRATIVE,
        closes_paren: false,
    },
    PatternFamily {
        label: "english-narrative",
        regex: &ENGLISH_NARRATIVE,
        closes_paren: false,
    },
    PatternFamily {
        label: "call-syntax",
        regex: &CALL_SYNTAX,
        closes_paren: true,
    },
];

/// Sentences in which the model claims a failure it cannot have observed yet
static APOLOGY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)",
        r"lo siento|disculp|lamentablemente",
        r"|problemas? (?:de|con) (?:la )?conexi[oó]n",
        r"|estoy teniendo (?:algunos )?problemas",
        r"|no (?:puedo|pude|he podido|es posible) (?:acceder|conectar|obtener|consultar)",
        r"|no tengo acceso",
        r"|error al (?:conectar|acceder|consultar)",
        r"|i'?m sorry|i am sorry|i apologi[sz]e|unfortunately",
        r"|(?:having|experiencing) (?:some )?(?:trouble|issues|problems|difficult(?:y|ies))",
        r"|(?:unable|not able) to (?:access|connect|retrieve|reach)",
        r"|(?:can'?t|cannot|couldn'?t|could not) (?:access|connect|retrieve|reach)",
        r"|connection (?:issue|problem|error)s?",
    ))
    .expect("apology pattern")
});

pub(crate) fn is_apology(sentence: &str) -> bool {
    APOLOGY.is_match(sentence)
}
