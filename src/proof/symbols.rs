//! Translation of LaTeX math markup into plain Unicode text
//!
//! Only the subset that shows up in ProofWiki pages is understood. Math
//! delimiters are dropped, known macros become Unicode symbols, and macros
//! with arguments are expanded through small `%s` templates. Unknown macros
//! are rendered as their bare name so nothing silently disappears.

use std::collections::HashMap;
use std::sync::LazyLock;

/// What a macro expands to
#[derive(Debug, Clone, Copy)]
enum Macro {
    /// Text with one `%s` per argument (no `%s` means no arguments)
    Template(&'static str),
    /// Combining mark appended to every character of the single argument
    Accent(char),
}

const TEMPLATES: &[(&str, &str)] = &[
    // Greek
    ("alpha", "α"),
    ("beta", "β"),
    ("gamma", "γ"),
    ("delta", "δ"),
    ("epsilon", "ϵ"),
    ("varepsilon", "ε"),
    ("zeta", "ζ"),
    ("eta", "η"),
    ("theta", "θ"),
    ("vartheta", "ϑ"),
    ("iota", "ι"),
    ("kappa", "κ"),
    ("lambda", "λ"),
    ("mu", "μ"),
    ("nu", "ν"),
    ("xi", "ξ"),
    ("pi", "π"),
    ("varpi", "ϖ"),
    ("rho", "ρ"),
    ("varrho", "ϱ"),
    ("sigma", "σ"),
    ("varsigma", "ς"),
    ("tau", "τ"),
    ("upsilon", "υ"),
    ("phi", "ϕ"),
    ("varphi", "φ"),
    ("chi", "χ"),
    ("psi", "ψ"),
    ("omega", "ω"),
    ("Gamma", "Γ"),
    ("Delta", "Δ"),
    ("Theta", "Θ"),
    ("Lambda", "Λ"),
    ("Xi", "Ξ"),
    ("Pi", "Π"),
    ("Sigma", "Σ"),
    ("Upsilon", "Υ"),
    ("Phi", "Φ"),
    ("Psi", "Ψ"),
    ("Omega", "Ω"),
    // Number sets
    ("N", "ℕ"),
    ("Z", "ℤ"),
    ("Q", "ℚ"),
    ("R", "ℝ"),
    ("C", "ℂ"),
    // Sets
    ("in", "∈"),
    ("notin", "∉"),
    ("ni", "∋"),
    ("subset", "⊂"),
    ("subseteq", "⊆"),
    ("subsetneq", "⊊"),
    ("supset", "⊃"),
    ("supseteq", "⊇"),
    ("cup", "∪"),
    ("cap", "∩"),
    ("bigcup", "⋃"),
    ("bigcap", "⋂"),
    ("setminus", "∖"),
    ("emptyset", "∅"),
    ("varnothing", "∅"),
    ("complement", "∁"),
    ("powerset", "𝒫"),
    // Relations
    ("le", "≤"),
    ("leq", "≤"),
    ("ge", "≥"),
    ("geq", "≥"),
    ("ne", "≠"),
    ("neq", "≠"),
    ("lt", "<"),
    ("gt", ">"),
    ("approx", "≈"),
    ("sim", "∼"),
    ("simeq", "≃"),
    ("cong", "≅"),
    ("equiv", "≡"),
    ("propto", "∝"),
    ("ll", "≪"),
    ("gg", "≫"),
    ("prec", "≺"),
    ("succ", "≻"),
    ("preceq", "⪯"),
    ("succeq", "⪰"),
    ("mid", "∣"),
    ("divides", "∣"),
    ("nmid", "∤"),
    ("perp", "⊥"),
    ("parallel", "∥"),
    // Logic
    ("forall", "∀"),
    ("exists", "∃"),
    ("nexists", "∄"),
    ("neg", "¬"),
    ("lnot", "¬"),
    ("land", "∧"),
    ("lor", "∨"),
    ("wedge", "∧"),
    ("vee", "∨"),
    ("implies", "⇒"),
    ("impliedby", "⟸"),
    ("iff", "⟺"),
    ("therefore", "∴"),
    ("because", "∵"),
    ("top", "⊤"),
    ("bot", "⊥"),
    ("vdash", "⊢"),
    ("models", "⊨"),
    // Arrows
    ("to", "→"),
    ("rightarrow", "→"),
    ("leftarrow", "←"),
    ("gets", "←"),
    ("Rightarrow", "⇒"),
    ("Leftarrow", "⇐"),
    ("leftrightarrow", "↔"),
    ("Leftrightarrow", "⇔"),
    ("longrightarrow", "⟶"),
    ("longleftarrow", "⟵"),
    ("mapsto", "↦"),
    ("uparrow", "↑"),
    ("downarrow", "↓"),
    ("hookrightarrow", "↪"),
    ("leadsto", "⇝"),
    // Operators
    ("times", "×"),
    ("cdot", "⋅"),
    ("div", "÷"),
    ("pm", "±"),
    ("mp", "∓"),
    ("circ", "∘"),
    ("ast", "∗"),
    ("star", "⋆"),
    ("bullet", "∙"),
    ("oplus", "⊕"),
    ("otimes", "⊗"),
    ("infty", "∞"),
    ("partial", "∂"),
    ("nabla", "∇"),
    ("sum", "∑"),
    ("prod", "∏"),
    ("coprod", "∐"),
    ("int", "∫"),
    ("iint", "∬"),
    ("oint", "∮"),
    ("ldots", "…"),
    ("dots", "…"),
    ("cdots", "⋯"),
    ("vdots", "⋮"),
    ("ddots", "⋱"),
    // Delimiters
    ("langle", "⟨"),
    ("rangle", "⟩"),
    ("lfloor", "⌊"),
    ("rfloor", "⌋"),
    ("lceil", "⌈"),
    ("rceil", "⌉"),
    ("lbrace", "{"),
    ("rbrace", "}"),
    ("lbrack", "["),
    ("rbrack", "]"),
    ("vert", "|"),
    ("lvert", "|"),
    ("rvert", "|"),
    ("Vert", "‖"),
    ("lVert", "‖"),
    ("rVert", "‖"),
    // Letter-like
    ("aleph", "ℵ"),
    ("ell", "ℓ"),
    ("hbar", "ℏ"),
    ("Re", "ℜ"),
    ("Im", "ℑ"),
    ("wp", "℘"),
    ("prime", "′"),
    ("angle", "∠"),
    ("triangle", "△"),
    ("square", "□"),
    ("Box", "□"),
    ("blacksquare", "■"),
    ("dagger", "†"),
    ("checkmark", "✓"),
    // Named functions
    ("sin", "sin"),
    ("cos", "cos"),
    ("tan", "tan"),
    ("sec", "sec"),
    ("csc", "csc"),
    ("cot", "cot"),
    ("sinh", "sinh"),
    ("cosh", "cosh"),
    ("tanh", "tanh"),
    ("arcsin", "arcsin"),
    ("arccos", "arccos"),
    ("arctan", "arctan"),
    ("log", "log"),
    ("ln", "ln"),
    ("lg", "lg"),
    ("exp", "exp"),
    ("lim", "lim"),
    ("limsup", "lim sup"),
    ("liminf", "lim inf"),
    ("max", "max"),
    ("min", "min"),
    ("sup", "sup"),
    ("inf", "inf"),
    ("det", "det"),
    ("dim", "dim"),
    ("ker", "ker"),
    ("deg", "deg"),
    ("arg", "arg"),
    ("hom", "hom"),
    ("gcd", "gcd"),
    ("lcm", "lcm"),
    ("bmod", "mod"),
    ("mod", "mod"),
    ("pmod", "(mod %s)"),
    // Spacing
    ("quad", "  "),
    ("qquad", "    "),
    ("enspace", " "),
    ("thinspace", " "),
    ("cr", "\n"),
    ("newline", "\n"),
    // Sizing and style switches
    ("displaystyle", ""),
    ("textstyle", ""),
    ("limits", ""),
    ("nolimits", ""),
    ("big", ""),
    ("Big", ""),
    ("bigg", ""),
    ("Bigg", ""),
    ("bigl", ""),
    ("bigr", ""),
    ("Bigl", ""),
    ("Bigr", ""),
    ("middle", ""),
    // Fonts
    ("text", "%s"),
    ("textrm", "%s"),
    ("textit", "%s"),
    ("textbf", "%s"),
    ("mathrm", "%s"),
    ("mathit", "%s"),
    ("mathbf", "%s"),
    ("mathsf", "%s"),
    ("mathcal", "%s"),
    ("mathfrak", "%s"),
    ("boldsymbol", "%s"),
    ("operatorname", "%s"),
    ("mbox", "%s"),
    // Fractions and roots
    ("frac", "%s/%s"),
    ("dfrac", "%s/%s"),
    ("tfrac", "%s/%s"),
    ("cfrac", "%s/%s"),
    ("binom", "C(%s, %s)"),
    ("dbinom", "C(%s, %s)"),
    ("sqrt", "√%s"),
    // ProofWiki
    ("paren", "(%s)"),
    ("set", "{%s}"),
    ("sqbrk", "[%s]"),
    ("tuple", "(%s)"),
    ("size", "|%s|"),
    ("abs", "|%s|"),
    ("norm", "‖%s‖"),
    ("floor", "⌊%s⌋"),
    ("ceiling", "⌈%s⌉"),
    ("map", "%s(%s)"),
];

const ACCENTS: &[(&str, char)] = &[
    ("hat", '\u{302}'),
    ("widehat", '\u{302}'),
    ("tilde", '\u{303}'),
    ("widetilde", '\u{303}'),
    ("bar", '\u{304}'),
    ("overline", '\u{305}'),
    ("dot", '\u{307}'),
    ("ddot", '\u{308}'),
    ("vec", '\u{20d7}'),
    ("underline", '\u{332}'),
    ("cancel", '\u{338}'),
    ("not", '\u{338}'),
];

/// Deepest group or macro nesting that is expanded; anything deeper is
/// copied through as text
const MAX_DEPTH: usize = 256;

static MACROS: LazyLock<HashMap<&'static str, Macro>> = LazyLock::new(|| {
    TEMPLATES
        .iter()
        .map(|&(name, text)| (name, Macro::Template(text)))
        .chain(ACCENTS.iter().map(|&(name, mark)| (name, Macro::Accent(mark))))
        .collect()
});

/// Translate markup into display text.
pub fn translate(markup: &str) -> String {
    let chars: Vec<char> = markup.chars().collect();
    let mut translator = Translator {
        chars: &chars,
        pos: 0,
        depth: 0,
    };
    let mut out = String::with_capacity(markup.len());
    translator.render(&mut out, false);
    out
}

struct Translator<'a> {
    chars: &'a [char],
    pos: usize,
    depth: usize,
}

impl Translator<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    /// Enter one nesting level, or return false at the depth limit.
    fn descend(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            return false;
        }
        self.depth += 1;
        true
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    /// Render a brace group whose opening brace was just consumed.
    fn group(&mut self, out: &mut String) {
        if self.descend() {
            self.render(out, true);
            self.ascend();
        } else {
            out.push('{');
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// Render until the end of input, or the closing brace of the current
    /// group when `in_group` is set.
    fn render(&mut self, out: &mut String, in_group: bool) {
        while let Some(c) = self.bump() {
            match c {
                '$' => {}
                '{' => self.group(out),
                '}' if in_group => return,
                '}' => {}
                '~' => out.push(' '),
                '\\' => self.control(out),
                _ => out.push(c),
            }
        }
    }

    /// Render the control sequence following a backslash.
    fn control(&mut self, out: &mut String) {
        let Some(c) = self.peek() else {
            out.push('\\');
            return;
        };

        if !c.is_ascii_alphabetic() {
            self.pos += 1;
            match c {
                '\\' => out.push('\n'),
                ',' | ';' | ':' | '>' | ' ' | '\n' => out.push(' '),
                '!' => {}
                '|' => out.push('‖'),
                _ => out.push(c),
            }
            return;
        }

        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if self.descend() {
            self.expand(&name, out);
            self.ascend();
        } else {
            out.push_str(&name);
        }
    }

    fn expand(&mut self, name: &str, out: &mut String) {
        match name {
            "begin" | "end" => {
                self.argument();
            }
            "left" | "right" => {
                // `\left.` is an invisible delimiter
                if self.peek() == Some('.') {
                    self.pos += 1;
                }
            }
            "mathbb" => out.extend(self.argument().chars().map(double_struck)),
            "sqrt" => {
                if let Some(index) = self.optional_argument() {
                    out.push_str(&index);
                }
                self.fill("√%s", out);
            }
            _ => match MACROS.get(name) {
                Some(Macro::Template(template)) => self.fill(template, out),
                Some(Macro::Accent(mark)) => {
                    for c in self.argument().chars() {
                        out.push(c);
                        if !c.is_whitespace() {
                            out.push(*mark);
                        }
                    }
                }
                None => out.push_str(name),
            },
        }
    }

    /// Expand a template, reading one argument per `%s`.
    fn fill(&mut self, template: &str, out: &mut String) {
        let mut pieces = template.split("%s");
        if let Some(first) = pieces.next() {
            out.push_str(first);
        }
        for piece in pieces {
            let arg = self.argument();
            out.push_str(&arg);
            out.push_str(piece);
        }
    }

    /// Read and render one macro argument: a brace group, a control
    /// sequence, or a single character.
    fn argument(&mut self) -> String {
        self.skip_whitespace();
        let mut arg = String::new();
        match self.bump() {
            Some('{') => self.group(&mut arg),
            Some('\\') => self.control(&mut arg),
            Some('$') | Some('}') | None => {}
            Some(c) => arg.push(c),
        }
        arg
    }

    fn optional_argument(&mut self) -> Option<String> {
        let save = self.pos;
        self.skip_whitespace();
        if self.peek() != Some('[') {
            self.pos = save;
            return None;
        }
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != ']') {
            self.pos += 1;
        }
        let end = self.pos;
        self.bump();

        let mut inner = Translator {
            chars: &self.chars[start..end],
            pos: 0,
            depth: self.depth,
        };
        let mut index = String::new();
        inner.render(&mut index, false);
        Some(index)
    }
}

fn double_struck(c: char) -> char {
    match c {
        'C' => 'ℂ',
        'H' => 'ℍ',
        'N' => 'ℕ',
        'P' => 'ℙ',
        'Q' => 'ℚ',
        'R' => 'ℝ',
        'Z' => 'ℤ',
        _ => c,
    }
}
