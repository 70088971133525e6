//! Function descriptors and their builder.

use xlkit_common::{
    Alternatives, AnyValue, Array, Element, Expectable, Expected, Int, Nil, Scalar, ScalarKind,
    Variant, XlString, XllError,
};

/// Maps a Rust argument or return type to its `REGISTER` type code.
pub trait ArgType {
    const CODE: &'static str;
}

impl ArgType for bool {
    const CODE: &'static str = "A";
}

impl ArgType for f64 {
    const CODE: &'static str = "B";
}

impl ArgType for String {
    const CODE: &'static str = "C";
}

impl ArgType for &str {
    const CODE: &'static str = "C";
}

impl<K: ScalarKind> ArgType for Scalar<K> {
    const CODE: &'static str = "Q";
}

impl ArgType for XlString {
    const CODE: &'static str = "Q";
}

impl<S: Alternatives> ArgType for Variant<S> {
    const CODE: &'static str = "Q";
}

impl<T: Expectable> ArgType for Expected<T> {
    const CODE: &'static str = "Q";
}

impl<T: Element> ArgType for Array<T> {
    const CODE: &'static str = "Q";
}

/// Suffix the host expects on a help topic to open it at context id 0.
const HELP_CONTEXT: &str = "!0";

/// The host drops the final two characters of the last `REGISTER` argument.
const LAST_ARGUMENT_PADDING: &str = "  ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub code: &'static str,
    pub help: String,
}

/// Everything the host needs to expose one worksheet function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub procedure: Option<String>,
    pub return_code: &'static str,
    pub parameters: Vec<Parameter>,
    pub visible: bool,
    pub category: Option<String>,
    pub description: String,
    pub help_topic: String,
    pub thread_safe: bool,
}

impl FunctionDescriptor {
    /// Exported symbol the host calls; defaults to the function name.
    pub fn procedure(&self) -> &str {
        self.procedure.as_deref().unwrap_or(&self.name)
    }

    /// Return code, parameter codes and the thread-safety marker.
    pub fn signature(&self) -> String {
        let mut signature = String::from(self.return_code);
        for p in &self.parameters {
            signature.push_str(p.code);
        }
        if self.thread_safe {
            signature.push('$');
        }
        signature
    }

    pub fn argument_names(&self) -> String {
        self.parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Arguments of the `REGISTER` call, in host order, with the last one
    /// padded.
    pub fn register_arguments(&self, module_path: &XlString) -> Result<Vec<AnyValue>, XllError> {
        let text = |s: &str| XlString::new(s).map(AnyValue::new);

        let mut args = vec![
            AnyValue::new(module_path.clone()),
            text(self.procedure())?,
            text(&self.signature())?,
            text(&self.name)?,
            text(&self.argument_names())?,
            AnyValue::new(Int::new(i32::from(self.visible))),
            match &self.category {
                Some(category) => text(category)?,
                None => AnyValue::new(Nil::default()),
            },
            AnyValue::new(Nil::default()),
            text(&self.help_topic)?,
            text(&self.description)?,
        ];
        for p in &self.parameters {
            args.push(text(&p.help)?);
        }

        let padded = match args.last().map(|last| last.get::<XlString, _>()) {
            Some(Ok(s)) => Some(s.concat_str(LAST_ARGUMENT_PADDING)?),
            _ => None,
        };
        if let (Some(padded), Some(last)) = (padded, args.last_mut()) {
            last.set(padded);
        }
        Ok(args)
    }
}

/// Builder for a [`FunctionDescriptor`].
///
/// ```
/// use xlkit_cffi::Function;
/// use xlkit_common::Number;
///
/// let f = Function::new("XLKIT.HYPOT")
///     .procedure("xlkit_hypot")
///     .result::<Number>()
///     .parameter::<f64>("x", "first leg")
///     .parameter::<f64>("y", "second leg")
///     .category("Math")
///     .thread_safe()
///     .build();
/// assert_eq!(f.signature(), "QBB$");
/// ```
#[derive(Debug, Clone)]
pub struct Function {
    descriptor: FunctionDescriptor,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: FunctionDescriptor {
                name: name.into(),
                procedure: None,
                return_code: <AnyValue as ArgType>::CODE,
                parameters: Vec::new(),
                visible: true,
                category: None,
                description: String::new(),
                help_topic: String::new(),
                thread_safe: false,
            },
        }
    }

    pub fn procedure(mut self, procedure: impl Into<String>) -> Self {
        self.descriptor.procedure = Some(procedure.into());
        self
    }

    pub fn result<T: ArgType>(mut self) -> Self {
        self.descriptor.return_code = T::CODE;
        self
    }

    pub fn parameter<T: ArgType>(mut self, name: impl Into<String>, help: impl Into<String>) -> Self {
        self.descriptor.parameters.push(Parameter {
            name: name.into(),
            code: T::CODE,
            help: help.into(),
        });
        self
    }

    pub fn hidden(mut self) -> Self {
        self.descriptor.visible = false;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.descriptor.category = Some(category.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = description.into();
        self
    }

    pub fn help(mut self, topic: impl Into<String>) -> Self {
        let mut topic = topic.into();
        topic.push_str(HELP_CONTEXT);
        self.descriptor.help_topic = topic;
        self
    }

    pub fn thread_safe(mut self) -> Self {
        self.descriptor.thread_safe = true;
        self
    }

    pub fn build(self) -> FunctionDescriptor {
        self.descriptor
    }
}

impl From<Function> for FunctionDescriptor {
    fn from(f: Function) -> Self {
        f.build()
    }
}
