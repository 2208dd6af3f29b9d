use bilua_common::LuaErrorKind;

use super::{eval_error, eval_value, interpreter_for};
use crate::value::Value;

/* ───────────────────── expressions & statements ───────────────────── */

#[test]
fn arithmetic_follows_lua_promotion() {
    assert_eq!(eval_value("return 25 + 13"), Value::from(38i64));
    assert_eq!(eval_value("return 2 * 3 + 1"), Value::from(7i64));
    assert_eq!(eval_value("return 6 / 3"), Value::from(2.0));
    assert_eq!(eval_value("return 7 // 2"), Value::from(3i64));
    assert_eq!(eval_value("return 7 % 3"), Value::from(1i64));
    assert_eq!(eval_value("return 2 ^ 10"), Value::from(1024.0));
    assert_eq!(eval_value("return 1 + 0.5"), Value::from(1.5));
}

#[test]
fn concat_coerces_numbers() {
    assert_eq!(eval_value("return \"n=\" .. 42"), Value::from("n=42"));
    assert_eq!(eval_value("return 1 .. 2"), Value::from("12"));
}

#[test]
fn comparison_semantics() {
    assert_eq!(eval_value("return 1 < 2"), Value::from(true));
    assert_eq!(eval_value("return \"a\" < \"b\""), Value::from(true));
    assert_eq!(eval_value("return 1 == 1.0"), Value::from(true));
    // equality across unrelated types is false, not an error
    assert_eq!(eval_value("return 1 == \"1\""), Value::from(false));
    let err = eval_error("return 1 < \"1\"");
    assert_eq!(err.kind, LuaErrorKind::Type);
}

#[test]
fn logical_operators_return_operands() {
    assert_eq!(eval_value("return false or 7"), Value::from(7i64));
    assert_eq!(eval_value("return nil and 7"), Value::nil());
    assert_eq!(eval_value("return 3 and 7"), Value::from(7i64));
    assert_eq!(eval_value("return not nil"), Value::from(true));
}

#[test]
fn short_circuit_skips_the_untaken_branch() {
    // counts calls through a closure; the branch must not run
    let source = r#"
        n = 0
        local function expensive()
            n = n + 1
            return true
        end
        local r = false and expensive()
        local s = true or expensive()
        return n
    "#;
    assert_eq!(eval_value(source), Value::from(0i64));
}

#[test]
fn multiple_assignment_evaluates_rhs_first() {
    assert_eq!(
        eval_value("local a, b = 1, 2\na, b = b, a\nreturn a .. \",\" .. b"),
        Value::from("2,1")
    );
}

#[test]
fn assignment_writes_innermost_binding_else_global() {
    let source = r#"
        x = 1
        do
            local x = 2
            x = 3
        end
        return x
    "#;
    assert_eq!(eval_value(source), Value::from(1i64));

    let source = r#"
        do
            y = 5
        end
        return y
    "#;
    assert_eq!(eval_value(source), Value::from(5i64));
}

#[test]
fn if_elseif_else_chain() {
    let source = r#"
        local function classify(n)
            if n < 0 then
                return "neg"
            elseif n == 0 then
                return "zero"
            else
                return "pos"
            end
        end
        return classify(-1) .. classify(0) .. classify(1)
    "#;
    assert_eq!(eval_value(source), Value::from("negzeropos"));
}

#[test]
fn while_and_repeat_loops() {
    let source = r#"
        local n, sum = 0, 0
        while n < 5 do
            n = n + 1
            sum = sum + n
        end
        return sum
    "#;
    assert_eq!(eval_value(source), Value::from(15i64));

    let source = r#"
        local n = 0
        repeat
            n = n + 1
            local done = n >= 3
        until done
        return n
    "#;
    assert_eq!(eval_value(source), Value::from(3i64));
}

#[test]
fn numeric_for_counts_and_scopes() {
    let (mut interpreter, sink) = interpreter_for("for i = 1, 3 do print(i) end\nreturn i");
    let result = interpreter.evaluate().unwrap();
    // the loop variable is local to the loop
    assert_eq!(result.value, Value::nil());
    assert_eq!(sink.contents(), "1\n2\n3\n");
}

#[test]
fn numeric_for_with_step() {
    assert_eq!(
        eval_value("local s = 0\nfor i = 10, 1, -3 do s = s + i end\nreturn s"),
        Value::from(22i64)
    );
    let err = eval_error("for i = 1, 3, 0 do end");
    assert_eq!(err.kind, LuaErrorKind::Arithmetic);
}

#[test]
fn generic_for_over_pairs_in_insertion_order() {
    let source = r#"
        local t = {}
        t.first = 1
        t.second = 2
        t.third = 3
        local keys = ""
        for k, v in pairs(t) do
            keys = keys .. k .. "=" .. v .. ";"
        end
        return keys
    "#;
    assert_eq!(eval_value(source), Value::from("first=1;second=2;third=3;"));
}

#[test]
fn generic_for_over_ipairs_stops_at_the_border() {
    let source = r#"
        local t = {10, 20, 30}
        t[5] = 50
        local sum = 0
        for i, v in ipairs(t) do
            sum = sum + v
        end
        return sum
    "#;
    assert_eq!(eval_value(source), Value::from(60i64));
}

#[test]
fn break_exits_the_innermost_loop() {
    let source = r#"
        local n = 0
        for i = 1, 10 do
            for j = 1, 10 do
                break
            end
            n = n + 1
            if i == 2 then break end
        end
        return n
    "#;
    assert_eq!(eval_value(source), Value::from(2i64));
}

#[test]
fn goto_jumps_within_the_block() {
    let source = r#"
        local n = 0
        for i = 1, 5 do
            if i % 2 == 0 then goto continue end
            n = n + i
            ::continue::
        end
        return n
    "#;
    assert_eq!(eval_value(source), Value::from(9i64));
}

#[test]
fn visit_limit_fires_after_exactly_the_budget() {
    let (mut interpreter, _) = interpreter_for("i = 0\nwhile true do i = i + 1 end");
    interpreter.set_visit_limit(10);
    let err = interpreter.evaluate().unwrap_err();
    assert_eq!(err.kind, LuaErrorKind::VisitLimit);
    // the body ran exactly visit_limit times before the watchdog fired
    assert_eq!(interpreter.environment().get("i"), Value::from(10i64));
}

/* ───────────────────── functions & calls ───────────────────── */

#[test]
fn closures_capture_their_defining_frame() {
    let source = r#"
        local function counter()
            local n = 0
            return function()
                n = n + 1
                return n
            end
        end
        local c = counter()
        c()
        c()
        return c()
    "#;
    assert_eq!(eval_value(source), Value::from(3i64));
}

#[test]
fn call_pads_and_discards_arguments() {
    let source = r#"
        local function f(a, b)
            return b
        end
        return f(1) == nil and f(1, 2, 3) == 2
    "#;
    assert_eq!(eval_value(source), Value::from(true));
}

#[test]
fn varargs_spread_and_truncate() {
    let source = r##"
        local function f(...)
            local a, b = ...
            return a + b, select("#", ...)
        end
        local sum, count = f(10, 20, 30)
        return sum + count
    "##;
    assert_eq!(eval_value(source), Value::from(33i64));
}

#[test]
fn multi_return_spreads_only_in_last_position() {
    let source = r#"
        local function two()
            return 1, 2
        end
        local a, b, c = two(), two()
        return a + b + c
    "#;
    // first call truncated to 1, second spreads to 1, 2
    assert_eq!(eval_value(source), Value::from(4i64));
}

#[test]
fn parentheses_truncate_multi_return() {
    let source = r#"
        local function two()
            return 1, 2
        end
        local a, b = (two())
        return b == nil and a == 1
    "#;
    assert_eq!(eval_value(source), Value::from(true));
}

#[test]
fn immediate_lambda_call() {
    assert_eq!(
        eval_value("return (function(x) return x * x end)(7)"),
        Value::from(49i64)
    );
}

#[test]
fn method_call_passes_the_receiver_once() {
    let source = r#"
        local evaluations = 0
        local obj = {value = 10}
        function obj.get(self, extra)
            return self.value + extra
        end
        local function fetch()
            evaluations = evaluations + 1
            return obj
        end
        local r = fetch():get(5)
        return r + evaluations
    "#;
    assert_eq!(eval_value(source), Value::from(16i64));
}

#[test]
fn calling_a_nil_global_reports_the_name() {
    let err = eval_error("missing()");
    assert_eq!(err.kind, LuaErrorKind::UndefinedName);
    assert!(err.to_string().contains("missing"));
}

#[test]
fn errors_carry_a_call_stack() {
    let source = r#"
        local function inner()
            return 1 + nil
        end
        local function outer()
            return inner()
        end
        return outer()
    "#;
    let err = eval_error(source);
    assert_eq!(err.kind, LuaErrorKind::Type);
    let functions: Vec<&str> = err.trace.iter().map(|f| f.function.as_str()).collect();
    assert_eq!(functions, vec!["inner", "outer"]);
}

/* ───────────────────── tables ───────────────────── */

#[test]
fn table_constructor_field_order_and_keys() {
    let source = r#"
        local n = 0
        local function tick()
            n = n + 1
            return n
        end
        local t = {tick(), x = tick(), [10] = tick(), tick()}
        return t[1] .. t.x .. t[10] .. t[2]
    "#;
    // fields evaluate in lexical order
    assert_eq!(eval_value(source), Value::from("1234"));
}

#[test]
fn trailing_call_splices_into_constructor() {
    let source = r#"
        local function three()
            return 7, 8, 9
        end
        local t = {1, three()}
        return #t .. ":" .. t[4]
    "#;
    assert_eq!(eval_value(source), Value::from("4:9"));
}

#[test]
fn tables_are_shared_by_handle() {
    let source = r#"
        local t = {}
        local u = t
        u.x = 1
        return t.x
    "#;
    assert_eq!(eval_value(source), Value::from(1i64));
}

#[test]
fn table_equality_is_identity() {
    let source = r#"
        local a = {1}
        local b = {1}
        return a ~= b and a == a
    "#;
    assert_eq!(eval_value(source), Value::from(true));
}

#[test]
fn length_operator_on_strings_and_tables() {
    assert_eq!(eval_value("return #\"hello\""), Value::from(5i64));
    assert_eq!(
        eval_value("local t = {1, 2, 3}\nreturn #t"),
        Value::from(3i64)
    );
    assert_eq!(eval_value("local t = {}\nreturn #t"), Value::from(0i64));
}

#[test]
fn index_metamethod_function_and_chain() {
    let source = r#"
        local base = {greeting = "hi"}
        local mid = setmetatable({}, {__index = base})
        local leaf = setmetatable({}, {__index = mid})
        return leaf.greeting
    "#;
    assert_eq!(eval_value(source), Value::from("hi"));

    let source = r#"
        local t = setmetatable({}, {
            __index = function(table, key)
                return key .. "!"
            end,
        })
        return t.knock
    "#;
    assert_eq!(eval_value(source), Value::from("knock!"));
}

#[test]
fn newindex_metamethod_intercepts_fresh_keys() {
    let source = r#"
        local log = {}
        local t = setmetatable({}, {
            __newindex = function(table, key, value)
                rawset(table, key, value * 2)
                log[#log + 1] = key
            end,
        })
        t.a = 10
        t.a = 20 -- key now present; metamethod must not fire
        return t.a .. ":" .. #log
    "#;
    assert_eq!(eval_value(source), Value::from("20:1"));
}

/* ───────────────────── built-ins ───────────────────── */

#[test]
fn print_is_tab_separated_with_newline() {
    let (mut interpreter, sink) = interpreter_for("print(1, \"two\", nil, true)");
    interpreter.evaluate().unwrap();
    assert_eq!(sink.contents(), "1\ttwo\tnil\ttrue\n");
}

#[test]
fn type_names() {
    assert_eq!(
        eval_value(
            "return type(nil) .. type(true) .. type(1) .. type(\"\") .. type({}) .. type(print)"
        ),
        Value::from("nilbooleannumberstringtablefunction")
    );
}

#[test]
fn tostring_and_tonumber() {
    assert_eq!(eval_value("return tostring(1.5)"), Value::from("1.5"));
    assert_eq!(eval_value("return tonumber(\"42\")"), Value::from(42i64));
    assert_eq!(eval_value("return tonumber(\"2.5\")"), Value::from(2.5));
    assert_eq!(eval_value("return tonumber(\"ff\", 16)"), Value::from(255i64));
    assert_eq!(eval_value("return tonumber(\"nope\")"), Value::nil());
}

#[test]
fn assert_and_error_raise_runtime_assertions() {
    let err = eval_error("assert(false, \"boom\")");
    assert_eq!(err.kind, LuaErrorKind::RuntimeAssertion);
    assert!(err.to_string().contains("boom"));

    let err = eval_error("error(\"bang\")");
    assert_eq!(err.kind, LuaErrorKind::RuntimeAssertion);
    assert!(err.to_string().contains("bang"));

    assert_eq!(eval_value("return assert(42)"), Value::from(42i64));
}

#[test]
fn bad_argument_messages_are_one_based() {
    let err = eval_error("return math.sin(\"x\")");
    assert_eq!(
        err.kind,
        LuaErrorKind::BadArgument {
            index: 1,
            function: "sin".to_string()
        }
    );
    assert!(
        err.to_string()
            .starts_with("bad argument #1 to 'sin' (number expected, got string)")
    );
}

#[test]
fn math_builtins() {
    assert_eq!(eval_value("return math.sqrt(9)"), Value::from(3.0));
    assert_eq!(eval_value("return math.abs(-4)"), Value::from(4i64));
    assert_eq!(eval_value("return math.floor(2.7)"), Value::from(2i64));
    assert_eq!(eval_value("return math.ceil(2.1)"), Value::from(3i64));
    assert_eq!(eval_value("return math.max(3, 9, 5)"), Value::from(9i64));
    assert_eq!(eval_value("return math.min(3, 9, 5)"), Value::from(3i64));
    assert_eq!(eval_value("return math.sin(0)"), Value::from(0.0));
    assert_eq!(
        eval_value("return math.cos(0) + math.pi > 4"),
        Value::from(true)
    );
}

#[test]
fn next_iterates_from_nothing() {
    let source = r#"
        local t = {first = 1}
        local k, v = next(t)
        return k .. "=" .. v
    "#;
    assert_eq!(eval_value(source), Value::from("first=1"));
    assert_eq!(eval_value("return next({})"), Value::nil());
}

#[test]
fn io_read_consumes_the_stdin_slot() {
    let (mut interpreter, sink) = interpreter_for(
        r#"
        local line = io.read()
        local n = io.read("n")
        io.write(line, "/", n + 1)
    "#,
    );
    interpreter
        .environment_mut()
        .set_stdin(Box::new(std::io::Cursor::new(b"hello\n41\n".to_vec())));
    interpreter.evaluate().unwrap();
    assert_eq!(sink.contents(), "hello/42");
}

/* ───────────────────── driver ───────────────────── */

#[test]
fn parse_errors_are_returned_not_raised() {
    let mut interpreter = crate::driver::Interpreter::new();
    let result = interpreter.parse("local = 1");
    assert!(!result.is_ok());
    // evaluating anyway surfaces a Parse-kind error
    let err = interpreter.evaluate().unwrap_err();
    assert_eq!(err.kind, LuaErrorKind::Parse);
}

#[test]
fn globals_survive_between_evaluations() {
    let (mut interpreter, _) = interpreter_for("counter = (counter or 0) + 1\nreturn counter");
    assert_eq!(interpreter.evaluate().unwrap().value, Value::from(1i64));
    assert_eq!(interpreter.evaluate().unwrap().value, Value::from(2i64));
}

#[test]
fn literal_round_trip() {
    for source in [
        "return 38",
        "return 14.5",
        "return true",
        "return nil",
        "return \"hi\\n\"",
    ] {
        let (mut interpreter, _) = interpreter_for(source);
        let value = interpreter.evaluate().unwrap().value;
        let literal = value.to_literal(interpreter.arena()).unwrap();

        let (mut second, _) = interpreter_for(&format!("return {literal}"));
        assert_eq!(second.evaluate().unwrap().value, value, "via {literal}");
    }
}
