use crate::console::eval::{EvalError, EvalErrorKind, Value};
use crate::console::input_source::ParseError;
use crate::console::logging::VecLogger;
use crate::console::sim::SimObjectId;
use crate::console::{Console, ConsoleConfig};

//------------------------------------------------------------------------------
// Interface for compiling and running sources
//------------------------------------------------------------------------------

pub(crate) struct Tester {
    test_name: String,
    config: ConsoleConfig,
    sources: Vec<String>,
}

impl Tester {
    /// Constructs a new tester, sources are executed in the order they are
    /// added, all in the same console.
    pub(crate) fn new<S: ToString>(test_name: S) -> Self {
        Self{
            test_name: test_name.to_string(),
            config: ConsoleConfig::default(),
            sources: Vec::new(),
        }
    }

    /// Utility for quick tests that run a single source and expect it to
    /// compile and run to completion.
    pub(crate) fn new_single_source_expect_ok<T: ToString, S: ToString>(test_name: T, source: S) -> EvalOkTester {
        Self::new(test_name)
            .with_source(source)
            .run()
            .expect_ok()
    }

    /// Utility for quick tests that use a single source file and expect the
    /// compilation to fail.
    pub(crate) fn new_single_source_expect_compile_err<T: ToString, S: ToString>(test_name: T, source: S) -> CompileErrTester {
        Self::new(test_name)
            .with_source(source)
            .run()
            .expect_compile_err()
    }

    pub(crate) fn with_config(mut self, config: ConsoleConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn with_source<S: ToString>(mut self, source: S) -> Self {
        self.sources.push(source.to_string());
        self
    }

    pub(crate) fn run(self) -> TesterResult {
        let logger = VecLogger::new();
        let mut console = Console::with_logger(self.config, Box::new(logger.clone()));
        let mut result = Value::Empty;

        for (source_idx, source) in self.sources.iter().enumerate() {
            let filename = format!("source{}.cs", source_idx + 1);
            let code = match console.compile(&filename, source) {
                Ok(code) => code,
                Err(error) => return TesterResult::CompileErr(CompileErrTester{ test_name: self.test_name, error }),
            };
            result = match console.execute(&code) {
                Ok(value) => value,
                Err(error) => return TesterResult::EvalErr(EvalErrTester{ test_name: self.test_name, error }),
            };
        }

        TesterResult::Ok(EvalOkTester{ test_name: self.test_name, console, logger, result })
    }
}

pub(crate) enum TesterResult {
    Ok(EvalOkTester),
    CompileErr(CompileErrTester),
    EvalErr(EvalErrTester),
}

impl TesterResult {
    pub(crate) fn expect_ok(self) -> EvalOkTester {
        match self {
            TesterResult::Ok(v) => v,
            TesterResult::CompileErr(err) => {
                println!("DEBUG: Full error:\n{}", &err.error);
                panic!("[{}] Expected the source to compile, but it failed with {}", err.test_name, err.error.message());
            },
            TesterResult::EvalErr(err) => {
                println!("DEBUG: Full error:\n{}", &err.error);
                panic!("[{}] Expected evaluation to succeed, but it failed with {}", err.test_name, err.error.message());
            },
        }
    }

    pub(crate) fn expect_compile_err(self) -> CompileErrTester {
        match self {
            TesterResult::CompileErr(err) => err,
            TesterResult::Ok(ok) => panic!("[{}] Expected compilation to fail, but it succeeded", ok.test_name),
            TesterResult::EvalErr(err) => panic!("[{}] Expected compilation to fail, but evaluation failed instead", err.test_name),
        }
    }

    pub(crate) fn expect_eval_err(self) -> EvalErrTester {
        match self {
            TesterResult::EvalErr(err) => err,
            TesterResult::Ok(ok) => panic!("[{}] Expected evaluation to fail, but it succeeded", ok.test_name),
            TesterResult::CompileErr(err) => {
                println!("DEBUG: Full error:\n{}", &err.error);
                panic!("[{}] Expected evaluation to fail, but compilation failed", err.test_name);
            },
        }
    }
}

//------------------------------------------------------------------------------
// Interface for successful evaluation
//------------------------------------------------------------------------------

pub(crate) struct EvalOkTester {
    test_name: String,
    console: Console,
    logger: VecLogger,
    result: Value,
}

impl EvalOkTester {
    pub(crate) fn console(&mut self) -> &mut Console {
        &mut self.console
    }

    pub(crate) fn result(&self) -> &Value {
        &self.result
    }

    /// Runs another snippet in the same console, its result replaces the
    /// current one.
    pub(crate) fn eval(mut self, source: &str) -> Self {
        self.result = match self.console.eval(source) {
            Ok(value) => value,
            Err(error) => panic!("[{}] Expected '{}' to evaluate, but it failed with {}", self.test_name, source, error),
        };
        self
    }

    pub(crate) fn assert_result(self, expected: &str) -> Self {
        assert_eq!(
            self.result.to_text(), expected,
            "[{}] Expected the result to be '{}' {}", self.test_name, expected, self.assert_postfix()
        );
        self
    }

    pub(crate) fn assert_result_empty(self) -> Self {
        assert!(
            self.result.is_empty(),
            "[{}] Expected an empty result {}", self.test_name, self.assert_postfix()
        );
        self
    }

    pub(crate) fn assert_global(self, name: &str, expected: &str) -> Self {
        let value = self.console.get_global(name);
        assert_eq!(
            value.to_text(), expected,
            "[{}] Expected global '{}' to be '{}' {}", self.test_name, name, expected, self.assert_postfix()
        );
        self
    }

    /// Checks that some logged line contains the text. Nothing is logged
    /// when logging is compiled out, so the check is skipped then.
    pub(crate) fn assert_logged(self, text: &str) -> Self {
        if !cfg!(feature = "no_logging") {
            assert!(
                self.logger.contains(text),
                "[{}] Expected a logged line containing '{}' {}", self.test_name, text, self.assert_postfix()
            );
        }
        self
    }

    pub(crate) fn assert_no_warnings(self) -> Self {
        let warnings: Vec<String> = self.logger.lines().into_iter()
            .filter(|line| line.starts_with("Warning:"))
            .collect();
        assert!(
            warnings.is_empty(),
            "[{}] Expected no warnings, got {:?}", self.test_name, warnings
        );
        self
    }

    pub(crate) fn for_object<F: Fn(ObjectTester)>(self, name: &str, f: F) -> Self {
        let id = match self.console.find_object(name) {
            Some(id) => id,
            None => panic!("[{}] Expected an object named '{}' {}", self.test_name, name, self.assert_postfix()),
        };
        f(ObjectTester{ test_name: &self.test_name, console: &self.console, id });
        self
    }

    pub(crate) fn assert_no_object(self, name: &str) -> Self {
        assert!(
            self.console.find_object(name).is_none(),
            "[{}] Expected no object named '{}'", self.test_name, name
        );
        self
    }

    fn assert_postfix(&self) -> String {
        format!("(result: '{}', log: {:?})", self.result.to_text(), self.logger.lines())
    }
}

pub(crate) struct ObjectTester<'a> {
    test_name: &'a str,
    console: &'a Console,
    id: SimObjectId,
}

impl<'a> ObjectTester<'a> {
    pub(crate) fn id(&self) -> SimObjectId {
        self.id
    }

    pub(crate) fn assert_class(self, expected: &str) -> Self {
        let class_name = self.console.object(self.id).map(|object| object.class_name().to_string());
        assert_eq!(
            class_name.as_deref(), Some(expected),
            "[{}] Expected object {} to be a '{}'", self.test_name, self.id, expected
        );
        self
    }

    pub(crate) fn assert_field(self, field: &str, expected: &str) -> Self {
        let value = self.console.get_field(self.id, field, None).unwrap_or(Value::Empty);
        assert_eq!(
            value.to_text(), expected,
            "[{}] Expected field '{}' of object {} to be '{}'", self.test_name, field, self.id, expected
        );
        self
    }

    pub(crate) fn assert_num_children(self, expected: usize) -> Self {
        let num = self.console.object(self.id).map_or(0, |object| object.children().len());
        assert_eq!(
            num, expected,
            "[{}] Expected object {} to have {} children, found {}", self.test_name, self.id, expected, num
        );
        self
    }
}

//------------------------------------------------------------------------------
// Interface for failures
//------------------------------------------------------------------------------

pub(crate) struct CompileErrTester {
    test_name: String,
    error: ParseError,
}

impl CompileErrTester {
    pub(crate) fn assert_line(self, line: u32) -> Self {
        assert_eq!(
            self.error.line(), line,
            "[{}] Expected the error on line {} for error: {}", self.test_name, line, &self.error
        );
        self
    }

    pub(crate) fn assert_msg_has(self, msg: &str) -> Self {
        assert!(
            self.error.message().contains(msg),
            "[{}] Expected the error message to contain '{}' for error: {}", self.test_name, msg, &self.error
        );
        self
    }

    pub(crate) fn assert_ctx_has(self, msg: &str) -> Self {
        let context = self.error.statements.first().map(|stmt| stmt.context.as_str()).unwrap_or("");
        assert!(
            context.contains(msg),
            "[{}] Expected the error context to contain '{}' for error: {}", self.test_name, msg, &self.error
        );
        self
    }
}

pub(crate) struct EvalErrTester {
    test_name: String,
    error: EvalError,
}

impl EvalErrTester {
    pub(crate) fn assert_kind(self, kind: EvalErrorKind) -> Self {
        assert_eq!(
            self.error.kind(), kind,
            "[{}] Expected a {:?} error, got: {}", self.test_name, kind, &self.error
        );
        self
    }

    pub(crate) fn assert_innermost_function(self, function: &str) -> Self {
        let innermost = self.error.frames().last().map(|frame| frame.function.as_str());
        assert_eq!(
            innermost, Some(function),
            "[{}] Expected the innermost frame to be '{}', got: {}", self.test_name, function, &self.error
        );
        self
    }
}
