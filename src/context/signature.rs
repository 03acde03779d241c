//! Signature Extraction
//!
//! Lossy, single-pass transformation of source text into declarations-only
//! form: imports/exports, type/interface/struct bodies, and function/class/
//! method signatures with implementation bodies elided.
//!
//! The scanner tracks nested-brace depth to capture multi-line bodies and
//! deliberately never attempts semantic parsing; mangled edge cases are
//! acceptable because the output only feeds a language model.

/// What a declaration line opens, driving how its body is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    /// Imports and data shapes: body kept verbatim (interface, struct, enum)
    KeepBody,
    /// Containers whose members are scanned for signatures (class, impl)
    Container,
    /// Callables: signature kept, body elided (fn, function, def)
    Callable,
    /// Bindings: kept as one line, initializer bodies elided (const, let)
    Binding,
}

/// Where to return after an elided body closes.
#[derive(Debug, Clone, Copy)]
enum Resume {
    TopLevel,
    Class { until_depth: usize },
}

#[derive(Debug, Clone, Copy)]
enum State {
    TopLevel,
    KeepBody { until_depth: usize },
    ClassBody { until_depth: usize },
    ElideBody { until_depth: usize, resume: Resume },
}

/// Deterministic declarations-only extraction.
pub fn extract_signatures(source: &str) -> String {
    let mut out = String::new();
    let mut depth: usize = 0;
    let mut state = State::TopLevel;

    for line in source.lines() {
        let trimmed = line.trim();
        let opens = line.matches('{').count();
        let closes = line.matches('}').count();
        let depth_after = (depth + opens).saturating_sub(closes);

        match state {
            State::TopLevel => {
                if let Some(kind) = classify_declaration(trimmed) {
                    match kind {
                        DeclKind::KeepBody => {
                            push_line(&mut out, line);
                            if depth_after > depth {
                                state = State::KeepBody { until_depth: depth };
                            }
                        }
                        DeclKind::Container => {
                            push_line(&mut out, line);
                            if depth_after > depth {
                                state = State::ClassBody { until_depth: depth };
                            }
                        }
                        DeclKind::Callable | DeclKind::Binding => {
                            if depth_after > depth {
                                push_line(&mut out, &elide_body(line));
                                state = State::ElideBody {
                                    until_depth: depth,
                                    resume: Resume::TopLevel,
                                };
                            } else {
                                push_line(&mut out, line);
                            }
                        }
                    }
                }
                // Non-declaration implementation statements are dropped.
            }
            State::KeepBody { until_depth } => {
                push_line(&mut out, line);
                if depth_after <= until_depth {
                    state = State::TopLevel;
                }
            }
            State::ClassBody { until_depth } => {
                if depth_after <= until_depth {
                    // The container's closing brace line
                    push_line(&mut out, line);
                    state = State::TopLevel;
                } else if depth == until_depth + 1 && looks_like_member_signature(trimmed) {
                    if depth_after > depth {
                        push_line(&mut out, &elide_body(line));
                        state = State::ElideBody {
                            until_depth: depth,
                            resume: Resume::Class { until_depth },
                        };
                    } else {
                        push_line(&mut out, line);
                    }
                }
                // Fields, decorators, and loose statements are dropped.
            }
            State::ElideBody {
                until_depth,
                resume,
            } => {
                if depth_after <= until_depth {
                    state = match resume {
                        Resume::TopLevel => State::TopLevel,
                        Resume::Class { until_depth } => State::ClassBody { until_depth },
                    };
                }
            }
        }

        depth = depth_after;
    }

    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Replace an opening body with an elision marker, keeping the signature.
fn elide_body(line: &str) -> String {
    match line.find('{') {
        Some(pos) => format!("{} {{ ... }}", line[..pos].trim_end()),
        None => line.trim_end().to_string(),
    }
}

/// Leading modifiers stripped before keyword classification.
const MODIFIERS: &[&str] = &[
    "pub",
    "export",
    "default",
    "public",
    "private",
    "protected",
    "internal",
    "static",
    "async",
    "abstract",
    "final",
    "unsafe",
    "extern",
    "declare",
    "override",
    "readonly",
    "open",
];

fn classify_declaration(trimmed: &str) -> Option<DeclKind> {
    if trimmed.is_empty() {
        return None;
    }

    let mut words = trimmed.split_whitespace().peekable();
    while let Some(word) = words.peek() {
        let bare = word.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
        // `pub(crate)` style visibility still counts as a modifier
        let bare = bare.split('(').next().unwrap_or(bare);
        if MODIFIERS.contains(&bare) {
            words.next();
        } else {
            break;
        }
    }

    let keyword = words.next()?;
    let keyword = keyword.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());

    match keyword {
        "import" | "use" | "from" | "require" | "include" | "package" => Some(DeclKind::KeepBody),
        "interface" | "type" | "struct" | "enum" | "trait" | "union" => Some(DeclKind::KeepBody),
        "class" | "impl" | "mod" | "module" | "namespace" | "object" => Some(DeclKind::Container),
        "fn" | "function" | "def" | "func" | "constructor" => Some(DeclKind::Callable),
        "const" | "let" | "var" | "val" => Some(DeclKind::Binding),
        _ => None,
    }
}

/// Heuristic for class/impl members worth keeping: something callable,
/// not a control-flow statement.
fn looks_like_member_signature(trimmed: &str) -> bool {
    const CONTROL_FLOW: &[&str] = &[
        "if", "else", "for", "while", "switch", "match", "return", "catch", "try", "do", "loop",
    ];

    let Some(paren_pos) = trimmed.find('(') else {
        return false;
    };

    // Field initializers (`cache = new Map()`) have '=' before the parens;
    // method signatures do not.
    if let Some(eq_pos) = trimmed.find('=')
        && eq_pos < paren_pos
    {
        return false;
    }

    let first = trimmed
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .next()
        .unwrap_or("");

    !CONTROL_FLOW.contains(&first) && !first.is_empty()
}
