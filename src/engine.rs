use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::debug;

use crate::catalog::catalog;
use crate::codegen::{self, CompiledBlock};
use crate::error::EvalError;
use crate::ir::{link_arguments, Bindable, Constant, Variable};
use crate::optimizer;
use crate::parser::Parser;

/// Compilation options.
#[derive(Copy, Clone, Debug)]
pub struct Options {
    /// Emit sin/cos/tan with an explicit range-reduction refinement step,
    /// trading a little runtime for accuracy on large arguments.
    pub high_accuracy_trig: bool,
    /// Run the peephole and constant-folding passes. On by default; turning
    /// it off makes deeply nested expressions hit the FPU stack limit sooner.
    pub optimize: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            high_accuracy_trig: false,
            optimize: true,
        }
    }
}

/// A runtime compiler and evaluator for scalar math expressions.
///
/// An evaluator always holds exactly one live compiled callable; construction
/// installs the trivial expression `0`. Assigning an expression replaces the
/// callable atomically: on any compile error the previous one stays installed
/// and [`evaluate`](Self::evaluate) keeps returning its result.
///
/// # Examples
///
/// ```
/// use mathjit::Evaluator;
///
/// let mut eval = Evaluator::new();
/// let x: f64 = 3.0;
/// unsafe { eval.bind(&x, "x") }.unwrap();
/// eval.assign_expression("x*x + 1").unwrap();
/// assert_eq!(eval.evaluate(), 10.0);
/// ```
pub struct Evaluator {
    options: Options,
    constants: HashMap<String, Rc<Constant>>,
    variables: HashMap<String, Rc<Variable>>,
    expression: String,
    compiled: Compiled,
}

/// The installed callable plus strong references to every constant whose
/// address is baked into its code (literals and folded intermediates), so a
/// replaced or failed compilation can never leave the live code pointing at
/// freed memory.
struct Compiled {
    block: CompiledBlock,
    _constants: Vec<Rc<Constant>>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        let mut constants = HashMap::new();
        constants.insert("pi".to_string(), Constant::new(std::f64::consts::PI));
        constants.insert("e".to_string(), Constant::new(std::f64::consts::E));
        let variables = HashMap::new();
        let (compiled, _) = compile("0", &variables, &constants, &options)
            .expect("allocating the initial callable");
        Self {
            options,
            constants,
            variables,
            expression: "0".to_string(),
            compiled,
        }
    }

    /// Binds the numeric value at `addr` to `name`.
    ///
    /// The evaluator does not take ownership: it records the address and
    /// reads through it on every [`evaluate`](Self::evaluate) that mentions
    /// the variable.
    ///
    /// Fails with [`EvalError::BindNameConflict`] if the name is already a
    /// bound variable, a named constant (`pi`, `e`) or a catalog function.
    ///
    /// # Safety
    ///
    /// `addr` must stay valid, aligned and readable for as long as it is
    /// bound. The caller is responsible for not racing writes against a
    /// concurrent `evaluate` in a way that tears the value.
    pub unsafe fn bind<T: Bindable>(&mut self, addr: *const T, name: &str) -> Result<(), EvalError> {
        if self.variables.contains_key(name)
            || self.constants.contains_key(name)
            || catalog().contains_key(name)
        {
            return Err(EvalError::BindNameConflict {
                name: name.to_string(),
            });
        }
        self.variables.insert(
            name.to_string(),
            Rc::new(Variable {
                name: name.to_string(),
                addr: addr as *const (),
                ty: T::TYPE,
                referenced: Cell::new(false),
            }),
        );
        Ok(())
    }

    /// Removes the binding for `name`.
    ///
    /// If the currently compiled expression references the variable, the
    /// expression is first reset to `0` so no compiled code can read through
    /// the stale address.
    pub fn unbind(&mut self, name: &str) -> Result<(), EvalError> {
        let referenced = match self.variables.get(name) {
            Some(var) => var.referenced.get(),
            None => {
                return Err(EvalError::UnbindUnknown {
                    name: name.to_string(),
                })
            }
        };
        if referenced {
            self.assign_expression("0")?;
        }
        self.variables.remove(name);
        Ok(())
    }

    /// Compiles `text` and installs the resulting callable.
    ///
    /// Compilation is atomic: on any error (including an empty input, which
    /// is [`EvalError::EmptyExpression`]) the previously installed callable
    /// and the `referenced` state of every variable are left untouched.
    pub fn assign_expression(&mut self, text: &str) -> Result<(), EvalError> {
        let (compiled, used) = compile(text, &self.variables, &self.constants, &self.options)?;
        for var in self.variables.values() {
            var.referenced.set(false);
        }
        for name in &used {
            if let Some(var) = self.variables.get(name) {
                var.referenced.set(true);
            }
        }
        // The old page is released after the new one is installed.
        self.compiled = compiled;
        self.expression.clear();
        self.expression.push_str(text);
        Ok(())
    }

    /// Invokes the compiled callable, reading the current values of every
    /// bound variable it mentions. Never fails; NaN and infinities are
    /// ordinary results.
    pub fn evaluate(&self) -> f64 {
        self.compiled.block.invoke()
    }

    /// The currently installed expression text.
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

fn compile(
    text: &str,
    variables: &HashMap<String, Rc<Variable>>,
    constants: &HashMap<String, Rc<Constant>>,
    options: &Options,
) -> Result<(Compiled, HashSet<String>), EvalError> {
    let mut literals = HashMap::new();
    let parser = Parser::new(variables, constants, &mut literals, options.high_accuracy_trig);
    let parsed = parser.parse(text)?;
    let mut stream = parsed.stream;
    link_arguments(&mut stream);

    let mut intermediates: Vec<Rc<Constant>> = Vec::new();
    if options.optimize {
        stream = optimizer::optimize(stream, &mut intermediates)?;
    }

    let block = codegen::emit(&stream)?;
    debug!(
        "compiled \"{}\" ({} postfix nodes, {} folded)",
        text,
        stream.len(),
        intermediates.len()
    );

    let mut retained: Vec<Rc<Constant>> = literals.into_values().collect();
    retained.extend(intermediates);
    Ok((
        Compiled {
            block,
            _constants: retained,
        },
        parsed.used_vars,
    ))
}
