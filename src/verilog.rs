// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Owned AST, parser, and renderer for the structural Verilog subset that
//! synthesized gate-level netlists use.
//!
//! This intentionally covers only what the scan pipeline consumes: module
//! definitions with non-ANSI port lists, input/output/inout/wire/reg
//! declarations (optionally ranged), continuous assigns, and instance lists
//! with named or ordered connections. Expressions are identifiers (including
//! escaped identifiers), literals, bit/part selects, and concatenations.
//! Everything else is a syntax error.

use std::path::Path;

/// A bit range in a declaration or part select, `[msb:lsb]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub msb: i64,
    pub lsb: i64,
}

/// Expression subset appearing in connections and assigns.
///
/// Escaped identifiers keep their leading backslash in the stored name
/// (e.g. `\r1.q`); the renderer re-emits proper escaped-identifier syntax
/// for any name that is not a simple identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Ident(String),
    /// Literal text of a numeric constant, e.g. `4'b0101` or `1'bx`.
    Const(String),
    BitSelect { base: String, index: i64 },
    PartSelect { base: String, range: Range },
    Concat(Vec<Expr>),
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Ident(name) => write!(f, "{}", render_ident(name)),
            Expr::Const(text) => write!(f, "{}", text),
            Expr::BitSelect { base, index } => write!(f, "{}[{}]", render_ident(base), index),
            Expr::PartSelect { base, range } => {
                write!(f, "{}[{}:{}]", render_ident(base), range.msb, range.lsb)
            }
            Expr::Concat(elems) => {
                write!(f, "{{")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Input,
    Output,
    Inout,
    Wire,
    Reg,
}

impl DeclKind {
    fn keyword(self) -> &'static str {
        match self {
            DeclKind::Input => "input",
            DeclKind::Output => "output",
            DeclKind::Inout => "inout",
            DeclKind::Wire => "wire",
            DeclKind::Reg => "reg",
        }
    }
}

/// `input [3:0] a, b;` — one declaration statement, possibly multiple names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub kind: DeclKind,
    pub range: Option<Range>,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assign {
    pub lhs: Expr,
    pub rhs: Expr,
}

/// One port connection of an instance. `port` is `None` for ordered
/// connections, `expr` is `None` for explicitly unconnected pins (`.Q()`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub port: Option<String>,
    pub expr: Option<Expr>,
}

/// A single module instantiation. A source statement instantiating several
/// instances (`INV a (...), b (...);`) parses into one `Instance` per name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Referenced module (cell) name.
    pub module: String,
    /// Instance name.
    pub name: String,
    pub connections: Vec<Connection>,
}

impl Instance {
    /// Find the expression connected to a named port, if any.
    pub fn connection(&self, port: &str) -> Option<&Expr> {
        self.connections
            .iter()
            .find(|c| c.port.as_deref() == Some(port))
            .and_then(|c| c.expr.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Decl(Decl),
    Assign(Assign),
    Instance(Instance),
}

/// A module definition: ordered port name list plus ordered item list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub ports: Vec<String>,
    pub items: Vec<Item>,
}

impl Module {
    /// Names declared with `input` polarity, in declaration order.
    pub fn input_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for item in &self.items {
            if let Item::Decl(decl) = item {
                if decl.kind == DeclKind::Input {
                    names.extend(decl.names.iter().cloned());
                }
            }
        }
        names
    }

    /// Render the module back to source text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("module ");
        out.push_str(&render_ident(&self.name));
        out.push_str(" (");
        for (i, port) in self.ports.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&render_ident(port));
        }
        out.push_str(");\n");
        for item in &self.items {
            match item {
                Item::Decl(decl) => {
                    out.push_str("  ");
                    out.push_str(decl.kind.keyword());
                    if let Some(range) = decl.range {
                        out.push_str(&format!(" [{}:{}]", range.msb, range.lsb));
                    }
                    out.push(' ');
                    for (i, name) in decl.names.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(&render_ident(name));
                    }
                    out.push_str(";\n");
                }
                Item::Assign(assign) => {
                    out.push_str(&format!("  assign {} = {};\n", assign.lhs, assign.rhs));
                }
                Item::Instance(inst) => {
                    out.push_str("  ");
                    out.push_str(&render_ident(&inst.module));
                    out.push(' ');
                    out.push_str(&render_ident(&inst.name));
                    out.push_str(" (");
                    for (i, conn) in inst.connections.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        match (&conn.port, &conn.expr) {
                            (Some(port), Some(expr)) => {
                                out.push_str(&format!(".{}({})", render_ident(port), expr));
                            }
                            (Some(port), None) => {
                                out.push_str(&format!(".{}()", render_ident(port)));
                            }
                            (None, Some(expr)) => out.push_str(&format!("{}", expr)),
                            (None, None) => {}
                        }
                    }
                    out.push_str(");\n");
                }
            }
        }
        out.push_str("endmodule\n");
        out
    }
}

/// A parsed source file: one or more module definitions.
#[derive(Debug, Clone, Default)]
pub struct Netlist {
    pub modules: Vec<Module>,
}

impl Netlist {
    pub fn parse_file(path: &Path) -> Result<Self, VerilogError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VerilogError::Io(format!("{}: {}", path.display(), e)))?;
        Self::parse_str(&content)
    }

    pub fn parse_str(input: &str) -> Result<Self, VerilogError> {
        let mut parser = VerilogParser::new(input);
        parser.parse()
    }

    pub fn first_module(&self) -> Option<&Module> {
        self.modules.first()
    }

    pub fn first_module_mut(&mut self) -> Option<&mut Module> {
        self.modules.first_mut()
    }
}

/// Render an identifier, escaping it when it is not a simple identifier.
/// Escaped-identifier syntax requires the trailing space.
pub fn render_ident(name: &str) -> String {
    if let Some(rest) = name.strip_prefix('\\') {
        return format!("\\{} ", rest);
    }
    let simple = !name.is_empty()
        && !name.as_bytes()[0].is_ascii_digit()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$');
    if simple {
        name.to_string()
    } else {
        format!("\\{} ", name)
    }
}

#[derive(Debug)]
pub enum VerilogError {
    Io(String),
    Syntax(String, usize),
    UnexpectedEof,
}

impl std::fmt::Display for VerilogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerilogError::Io(msg) => write!(f, "verilog I/O error: {}", msg),
            VerilogError::Syntax(msg, pos) => {
                write!(f, "verilog syntax error at byte {}: {}", pos, msg)
            }
            VerilogError::UnexpectedEof => write!(f, "verilog unexpected end of file"),
        }
    }
}

impl std::error::Error for VerilogError {}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Simple or escaped identifier (escaped keeps its leading backslash)
    /// or keyword.
    Ident(String),
    /// Literal text of a number, e.g. `32` or `4'b01_01`.
    Number(String),
    /// Single punctuation byte: `( ) [ ] { } , ; : . = #`.
    Sym(u8),
}

/// Tokenizer for the structural netlist subset. Skips comments, attribute
/// instances `(* ... *)`, and compiler directives (backtick lines).
struct Tokenizer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos >= self.input.len() {
                return;
            }
            let ch = self.input[self.pos];
            if ch == b'/' && self.pos + 1 < self.input.len() {
                match self.input[self.pos + 1] {
                    b'/' => {
                        while self.pos < self.input.len() && self.input[self.pos] != b'\n' {
                            self.pos += 1;
                        }
                        continue;
                    }
                    b'*' => {
                        self.pos += 2;
                        while self.pos + 1 < self.input.len() {
                            if self.input[self.pos] == b'*' && self.input[self.pos + 1] == b'/' {
                                self.pos += 2;
                                break;
                            }
                            self.pos += 1;
                        }
                        continue;
                    }
                    _ => return,
                }
            }
            if ch == b'(' && self.pos + 1 < self.input.len() && self.input[self.pos + 1] == b'*' {
                // Attribute instance from synthesis, e.g. (* keep *)
                self.pos += 2;
                while self.pos + 1 < self.input.len() {
                    if self.input[self.pos] == b'*' && self.input[self.pos + 1] == b')' {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            if ch == b'`' {
                while self.pos < self.input.len() && self.input[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            return;
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_trivia();
        if self.pos >= self.input.len() {
            return None;
        }
        let ch = self.input[self.pos];
        match ch {
            b'(' | b')' | b'[' | b']' | b'{' | b'}' | b',' | b';' | b':' | b'.' | b'=' | b'#' => {
                self.pos += 1;
                Some(Token::Sym(ch))
            }
            b'\\' => {
                // Escaped identifier: backslash up to (exclusive) whitespace.
                let start = self.pos;
                self.pos += 1;
                while self.pos < self.input.len() && !self.input[self.pos].is_ascii_whitespace() {
                    self.pos += 1;
                }
                let s = std::str::from_utf8(&self.input[start..self.pos])
                    .unwrap_or("\\")
                    .to_string();
                Some(Token::Ident(s))
            }
            b'0'..=b'9' | b'\'' => {
                let start = self.pos;
                while self.pos < self.input.len() && self.input[self.pos].is_ascii_digit() {
                    self.pos += 1;
                }
                if self.pos < self.input.len() && self.input[self.pos] == b'\'' {
                    // Based literal: <size>'<base><digits>
                    self.pos += 1;
                    if self.pos < self.input.len() {
                        self.pos += 1; // base char (b/o/d/h, possibly signed s)
                    }
                    while self.pos < self.input.len() {
                        let c = self.input[self.pos];
                        if c.is_ascii_alphanumeric() || c == b'_' {
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                }
                let s = std::str::from_utf8(&self.input[start..self.pos])
                    .unwrap_or("0")
                    .to_string();
                Some(Token::Number(s))
            }
            _ => {
                let start = self.pos;
                while self.pos < self.input.len() {
                    let c = self.input[self.pos];
                    if c.is_ascii_alphanumeric() || c == b'_' || c == b'$' {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                if start == self.pos {
                    // Unknown byte; emit as symbol so the parser can report it.
                    self.pos += 1;
                    return Some(Token::Sym(ch));
                }
                let s = std::str::from_utf8(&self.input[start..self.pos])
                    .unwrap_or("")
                    .to_string();
                Some(Token::Ident(s))
            }
        }
    }

    fn peek_token(&mut self) -> Option<Token> {
        let saved = self.pos;
        let tok = self.next_token();
        self.pos = saved;
        tok
    }
}

struct VerilogParser<'a> {
    tokenizer: Tokenizer<'a>,
}

impl<'a> VerilogParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            tokenizer: Tokenizer::new(input),
        }
    }

    fn syntax<T>(&self, msg: String) -> Result<T, VerilogError> {
        Err(VerilogError::Syntax(msg, self.tokenizer.pos))
    }

    fn next(&mut self) -> Result<Token, VerilogError> {
        self.tokenizer.next_token().ok_or(VerilogError::UnexpectedEof)
    }

    fn expect_sym(&mut self, sym: u8) -> Result<(), VerilogError> {
        match self.next()? {
            Token::Sym(s) if s == sym => Ok(()),
            t => self.syntax(format!("expected '{}', got {:?}", sym as char, t)),
        }
    }

    fn expect_ident(&mut self) -> Result<String, VerilogError> {
        match self.next()? {
            Token::Ident(s) => Ok(s),
            t => self.syntax(format!("expected identifier, got {:?}", t)),
        }
    }

    fn expect_number_i64(&mut self) -> Result<i64, VerilogError> {
        match self.next()? {
            Token::Number(s) => s
                .parse::<i64>()
                .or_else(|_| self.syntax(format!("expected plain integer, got '{}'", s))),
            t => self.syntax(format!("expected number, got {:?}", t)),
        }
    }

    fn eat_sym(&mut self, sym: u8) -> bool {
        if self.tokenizer.peek_token() == Some(Token::Sym(sym)) {
            self.tokenizer.next_token();
            true
        } else {
            false
        }
    }

    fn parse(&mut self) -> Result<Netlist, VerilogError> {
        let mut netlist = Netlist::default();
        while let Some(tok) = self.tokenizer.next_token() {
            match tok {
                Token::Ident(kw) if kw == "module" => {
                    netlist.modules.push(self.parse_module()?);
                }
                t => return self.syntax(format!("expected 'module', got {:?}", t)),
            }
        }
        Ok(netlist)
    }

    fn parse_module(&mut self) -> Result<Module, VerilogError> {
        let name = self.expect_ident()?;
        let mut ports = Vec::new();
        if self.eat_sym(b'(') {
            if !self.eat_sym(b')') {
                loop {
                    ports.push(self.expect_ident()?);
                    if self.eat_sym(b',') {
                        continue;
                    }
                    self.expect_sym(b')')?;
                    break;
                }
            }
        }
        self.expect_sym(b';')?;

        let mut items = Vec::new();
        loop {
            let kw = self.expect_ident()?;
            match kw.as_str() {
                "endmodule" => break,
                "input" => items.push(Item::Decl(self.parse_decl(DeclKind::Input)?)),
                "output" => items.push(Item::Decl(self.parse_decl(DeclKind::Output)?)),
                "inout" => items.push(Item::Decl(self.parse_decl(DeclKind::Inout)?)),
                "wire" => items.push(Item::Decl(self.parse_decl(DeclKind::Wire)?)),
                "reg" => items.push(Item::Decl(self.parse_decl(DeclKind::Reg)?)),
                "assign" => items.push(Item::Assign(self.parse_assign()?)),
                _ => self.parse_instances(kw, &mut items)?,
            }
        }
        Ok(Module { name, ports, items })
    }

    fn parse_range(&mut self) -> Result<Option<Range>, VerilogError> {
        if !self.eat_sym(b'[') {
            return Ok(None);
        }
        let msb = self.expect_number_i64()?;
        self.expect_sym(b':')?;
        let lsb = self.expect_number_i64()?;
        self.expect_sym(b']')?;
        Ok(Some(Range { msb, lsb }))
    }

    fn parse_decl(&mut self, kind: DeclKind) -> Result<Decl, VerilogError> {
        let range = self.parse_range()?;
        let mut names = Vec::new();
        loop {
            names.push(self.expect_ident()?);
            if self.eat_sym(b',') {
                continue;
            }
            self.expect_sym(b';')?;
            break;
        }
        Ok(Decl { kind, range, names })
    }

    fn parse_assign(&mut self) -> Result<Assign, VerilogError> {
        let lhs = self.parse_expr()?;
        self.expect_sym(b'=')?;
        let rhs = self.parse_expr()?;
        self.expect_sym(b';')?;
        Ok(Assign { lhs, rhs })
    }

    fn parse_expr(&mut self) -> Result<Expr, VerilogError> {
        match self.next()? {
            Token::Ident(name) => {
                if self.eat_sym(b'[') {
                    let msb = self.expect_number_i64()?;
                    if self.eat_sym(b':') {
                        let lsb = self.expect_number_i64()?;
                        self.expect_sym(b']')?;
                        Ok(Expr::PartSelect {
                            base: name,
                            range: Range { msb, lsb },
                        })
                    } else {
                        self.expect_sym(b']')?;
                        Ok(Expr::BitSelect {
                            base: name,
                            index: msb,
                        })
                    }
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            Token::Number(text) => Ok(Expr::Const(text)),
            Token::Sym(b'{') => {
                let mut elems = Vec::new();
                loop {
                    elems.push(self.parse_expr()?);
                    if self.eat_sym(b',') {
                        continue;
                    }
                    self.expect_sym(b'}')?;
                    break;
                }
                Ok(Expr::Concat(elems))
            }
            t => self.syntax(format!("expected expression, got {:?}", t)),
        }
    }

    /// Parse the remainder of an instantiation statement whose cell name was
    /// already consumed. Emits one `Item::Instance` per instance name.
    fn parse_instances(&mut self, module: String, items: &mut Vec<Item>) -> Result<(), VerilogError> {
        if self.tokenizer.peek_token() == Some(Token::Sym(b'#')) {
            return self.syntax("parameterized instantiation not supported".to_string());
        }
        loop {
            let name = self.expect_ident()?;
            self.expect_sym(b'(')?;
            let mut connections = Vec::new();
            if !self.eat_sym(b')') {
                loop {
                    if self.eat_sym(b'.') {
                        let port = self.expect_ident()?;
                        self.expect_sym(b'(')?;
                        let expr = if self.eat_sym(b')') {
                            None
                        } else {
                            let e = self.parse_expr()?;
                            self.expect_sym(b')')?;
                            Some(e)
                        };
                        connections.push(Connection {
                            port: Some(port),
                            expr,
                        });
                    } else {
                        connections.push(Connection {
                            port: None,
                            expr: Some(self.parse_expr()?),
                        });
                    }
                    if self.eat_sym(b',') {
                        continue;
                    }
                    self.expect_sym(b')')?;
                    break;
                }
            }
            items.push(Item::Instance(Instance {
                module: module.clone(),
                name,
                connections,
            }));
            if self.eat_sym(b',') {
                continue;
            }
            self.expect_sym(b';')?;
            break;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_module() {
        let src = r#"
            // a trivial netlist
            module top (a, b, y);
              input a;
              input b;
              output y;
              wire w;
              AND2 g0 ( .A(a), .B(b), .Y(w) );
              assign y = w;
            endmodule
        "#;
        let netlist = Netlist::parse_str(src).unwrap();
        assert_eq!(netlist.modules.len(), 1);
        let m = netlist.first_module().unwrap();
        assert_eq!(m.name, "top");
        assert_eq!(m.ports, vec!["a", "b", "y"]);
        assert_eq!(m.items.len(), 6);
        match &m.items[4] {
            Item::Instance(inst) => {
                assert_eq!(inst.module, "AND2");
                assert_eq!(inst.name, "g0");
                assert_eq!(inst.connection("A"), Some(&Expr::Ident("a".to_string())));
                assert_eq!(inst.connection("Y"), Some(&Expr::Ident("w".to_string())));
            }
            other => panic!("expected instance, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_escaped_identifiers_and_ranges() {
        let src = r#"
            module m (\x.y , z);
              input [3:0] z;
              output \x.y ;
              assign \x.y = z[2];
            endmodule
        "#;
        let netlist = Netlist::parse_str(src).unwrap();
        let m = netlist.first_module().unwrap();
        assert_eq!(m.ports, vec!["\\x.y", "z"]);
        match &m.items[2] {
            Item::Assign(a) => {
                assert_eq!(a.lhs, Expr::Ident("\\x.y".to_string()));
                assert_eq!(
                    a.rhs,
                    Expr::BitSelect {
                        base: "z".to_string(),
                        index: 2
                    }
                );
            }
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_concat_and_constants() {
        let src = r#"
            module m (a);
              input a;
              BB u0 ( .P({a, 1'b0, a}), .Q(4'b01_01) );
            endmodule
        "#;
        let netlist = Netlist::parse_str(src).unwrap();
        let m = netlist.first_module().unwrap();
        match &m.items[1] {
            Item::Instance(inst) => {
                match inst.connection("P").unwrap() {
                    Expr::Concat(elems) => assert_eq!(elems.len(), 3),
                    other => panic!("expected concat, got {:?}", other),
                }
                assert_eq!(
                    inst.connection("Q"),
                    Some(&Expr::Const("4'b01_01".to_string()))
                );
            }
            other => panic!("expected instance, got {:?}", other),
        }
    }

    #[test]
    fn test_attributes_and_directives_skipped() {
        let src = "`timescale 1ns/1ps\n(* top *)\nmodule m (a);\n  (* keep *) input a;\nendmodule\n";
        let netlist = Netlist::parse_str(src).unwrap();
        assert_eq!(netlist.first_module().unwrap().ports, vec!["a"]);
    }

    #[test]
    fn test_render_round_trip() {
        let src = "module m (a, \\b.q );\n  input a;\n  output \\b.q ;\n  assign \\b.q = a;\nendmodule\n";
        let netlist = Netlist::parse_str(src).unwrap();
        let rendered = netlist.first_module().unwrap().render();
        let reparsed = Netlist::parse_str(&rendered).unwrap();
        assert_eq!(netlist.modules, reparsed.modules);
        assert!(rendered.contains("assign \\b.q  = a;") || rendered.contains("assign \\b.q = a;"));
    }

    #[test]
    fn test_render_escapes_dotted_names() {
        let m = Module {
            name: "m".to_string(),
            ports: vec!["u0.sel".to_string()],
            items: vec![Item::Decl(Decl {
                kind: DeclKind::Input,
                range: None,
                names: vec!["u0.sel".to_string()],
            })],
        };
        let text = m.render();
        assert!(text.contains("\\u0.sel "));
    }

    #[test]
    fn test_multi_instance_statement() {
        let src = "module m (a, b);\n  input a;\n  output b;\n  INV i0 (.A(a), .Y(b)), i1 (.A(b), .Y(a));\nendmodule\n";
        let netlist = Netlist::parse_str(src).unwrap();
        let m = netlist.first_module().unwrap();
        let instances: Vec<_> = m
            .items
            .iter()
            .filter_map(|i| match i {
                Item::Instance(inst) => Some(inst.name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(instances, vec!["i0", "i1"]);
    }

    #[test]
    fn test_missing_module_keyword_is_error() {
        let err = Netlist::parse_str("wire x;").unwrap_err();
        match err {
            VerilogError::Syntax(..) => {}
            other => panic!("expected syntax error, got {:?}", other),
        }
    }
}
