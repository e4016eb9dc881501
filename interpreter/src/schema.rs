use script::command::{Arg, Command};

use crate::error::ExecuteError;

/// Every command the interpreter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    ReadFile,
    ListFiles,
    CreateFile,
    Undo,
    Redo,
    Input,
    Select,
    Replace,
    Copy,
    Cut,
    Paste,
    GetSyntaxErrors,
    Search,
    RunInTerminal,
    MemoryWrite,
    ReadMemory,
    ClearMemory,
    ClearConversation,
}

/// A typed argument position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Any scalar, rendered as text.
    Text(&'static str),
    /// A non-negative integer.
    Int(&'static str),
    /// A non-negative integer that may be omitted.
    OptInt(&'static str),
}

use Slot::{Int, OptInt, Text};

const READ_FILE: &[Slot] = &[Text("path"), OptInt("startLine"), OptInt("endLine")];
const PATH: &[Slot] = &[Text("path")];
const INPUT: &[Slot] = &[Text("path"), Int("line"), Int("column"), Text("text")];
const RANGE: &[Slot] = &[
    Int("startLine"),
    Int("startColumn"),
    Int("endLine"),
    Int("endColumn"),
];
const PATH_AND_RANGE: &[Slot] = &[
    Text("path"),
    Int("startLine"),
    Int("startColumn"),
    Int("endLine"),
    Int("endColumn"),
];
const REPLACE: &[Slot] = &[
    Text("path"),
    Int("startLine"),
    Int("startColumn"),
    Int("endLine"),
    Int("endColumn"),
    Text("text"),
];
const PASTE: &[Slot] = &[Text("path"), Int("line"), Int("column")];

impl Directive {
    pub fn from_name(name: &str) -> Option<Self> {
        let directive = match name {
            "readFile" => Directive::ReadFile,
            "listFiles" => Directive::ListFiles,
            "createFile" => Directive::CreateFile,
            "undo" => Directive::Undo,
            "redo" => Directive::Redo,
            "input" => Directive::Input,
            "select" => Directive::Select,
            "replace" => Directive::Replace,
            "copy" => Directive::Copy,
            "cut" => Directive::Cut,
            "paste" => Directive::Paste,
            "getSyntaxErrors" => Directive::GetSyntaxErrors,
            "search" => Directive::Search,
            "runInTerminal" => Directive::RunInTerminal,
            "memoryWrite" => Directive::MemoryWrite,
            "readMemory" => Directive::ReadMemory,
            "clearMemory" => Directive::ClearMemory,
            "clearConversation" => Directive::ClearConversation,
            _ => return None,
        };
        Some(directive)
    }

    pub fn slots(self) -> &'static [Slot] {
        match self {
            Directive::ReadFile => READ_FILE,
            Directive::ListFiles | Directive::CreateFile => PATH,
            Directive::Undo
            | Directive::Redo
            | Directive::GetSyntaxErrors
            | Directive::ReadMemory
            | Directive::ClearMemory
            | Directive::ClearConversation => &[],
            Directive::Input => INPUT,
            Directive::Select => RANGE,
            Directive::Replace => REPLACE,
            Directive::Copy | Directive::Cut => PATH_AND_RANGE,
            Directive::Paste => PASTE,
            Directive::Search => &[Text("query")],
            Directive::RunInTerminal => &[Text("command")],
            Directive::MemoryWrite => &[Text("text")],
        }
    }

    /// Check a command's arguments against this directive's slots.
    /// Surplus arguments are ignored.
    pub fn bind(self, command: &Command) -> Result<BoundArgs, ExecuteError> {
        let mut values = Vec::with_capacity(self.slots().len());
        for (index, slot) in self.slots().iter().enumerate() {
            let arg = command.args.get(index);
            let value = match (slot, arg) {
                (Text(_), Some(arg)) => Value::Text(arg.to_string()),
                (Int(_) | OptInt(_), Some(arg)) => Value::Int(Some(
                    to_index(arg).ok_or_else(|| invalid(command, slot, arg))?,
                )),
                (OptInt(_), None) => Value::Int(None),
                (Text(name) | Int(name), None) => {
                    return Err(ExecuteError::InvalidArguments {
                        command: command.name.clone(),
                        message: format!("missing argument <{}>", name),
                    });
                }
            };
            values.push(value);
        }
        Ok(BoundArgs { values })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Text(String),
    Int(Option<usize>),
}

/// Arguments that passed their directive's schema.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArgs {
    values: Vec<Value>,
}

impl BoundArgs {
    /// Text slot at `index`. Panics if the slot is not a text slot.
    pub fn text(&self, index: usize) -> &str {
        match &self.values[index] {
            Value::Text(s) => s,
            other => panic!("slot {} is not text: {:?}", index, other),
        }
    }

    /// Integer slot at `index`. Panics if the slot is not an integer slot.
    pub fn int(&self, index: usize) -> usize {
        self.opt_int(index)
            .unwrap_or_else(|| panic!("slot {} is an omitted optional integer", index))
    }

    pub fn opt_int(&self, index: usize) -> Option<usize> {
        match &self.values[index] {
            Value::Int(n) => *n,
            other => panic!("slot {} is not an integer: {:?}", index, other),
        }
    }
}

fn to_index(arg: &Arg) -> Option<usize> {
    match arg {
        Arg::Integer(i) => usize::try_from(*i).ok(),
        Arg::Float(f) if f.fract() == 0.0 && *f >= 0.0 && *f <= usize::MAX as f64 => {
            Some(*f as usize)
        }
        Arg::Text(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}

fn invalid(command: &Command, slot: &Slot, arg: &Arg) -> ExecuteError {
    let name = match slot {
        Text(name) | Int(name) | OptInt(name) => name,
    };
    ExecuteError::InvalidArguments {
        command: command.name.clone(),
        message: format!(
            "<{}> must be a non-negative integer, got {} `{}`",
            name,
            arg.type_name(),
            arg
        ),
    }
}
