use super::*;
use maplit::hashmap;

#[test]
fn test_string_functions() {
    let expected = hashmap!{
        "strlen(\"hello\")" => "5",
        "strlen(\"\")" => "0",
        "strupr(\"abc\") SPC strlwr(\"DEF\")" => "ABC def",
        "getWordCount(\"one two three\")" => "3",
        "getWordCount(\"one two  three\")" => "4",
        "getWordCount(\"\")" => "0",
        "getWord(\"one two three\", 1)" => "two",
        "\"[\" @ getWord(\"one two\", 5) @ \"]\"" => "[]",
        "getWord(\"a\\tb\\nc\", 2)" => "c",
        "getSubStr(\"abcdef\", 2, 3)" => "cde",
        "getSubStr(\"abcdef\", 4)" => "ef",
        "getSubStr(\"abcdef\", 1, -1)" => "bcdef",
        "getSubStr(\"abc\", 10, 2)" => "",
    };

    for (expression, result) in expected {
        Tester::new_single_source_expect_ok(expression, format!("return {};", expression))
            .assert_result(result);
    }
}

#[test]
fn test_math_functions() {
    let expected = hashmap!{
        "mFloor(2.7)" => "2",
        "mFloor(-2.5)" => "-3",
        "mFloor(\"9.99\")" => "9",
        "mAbs(-4.5)" => "4.5",
        "mAbs(3)" => "3",
    };

    for (expression, result) in expected {
        Tester::new_single_source_expect_ok(expression, format!("return {};", expression))
            .assert_result(result);
    }
}

#[test]
fn test_output_functions() {
    Tester::new_single_source_expect_ok("echo", "
        echo(\"hi \", 42);
        warn(\"careful\");
        error(\"broken\");
    ")
        .assert_result_empty()
        .assert_logged("hi 42")
        .assert_logged("Warning: careful")
        .assert_logged("Error: broken");

    Tester::new("warnings can be silenced")
        .with_config(ConsoleConfig{ echo_warnings: false, ..ConsoleConfig::default() })
        .with_source("nothere(); echo(\"done\");")
        .run()
        .expect_ok()
        .assert_logged("done")
        .assert_no_warnings();
}

#[test]
fn test_eval() {
    Tester::new_single_source_expect_ok("runs in the same console", "
        eval(\"$evaluated = 1 + 2;\");
        return $evaluated;
    ").assert_result("3");

    Tester::new_single_source_expect_ok("returns the result", "
        return eval(\"return 5 * 5;\");
    ").assert_result("25");

    Tester::new_single_source_expect_ok("defines functions", "
        eval(\"function later() { return \\\"late\\\"; }\");
        return later();
    ").assert_result("late");

    Tester::new_single_source_expect_ok("has its own frame", "
        %local = 1;
        return \"[\" @ eval(\"return %local;\") @ \"]\";
    ").assert_result("[]");

    Tester::new_single_source_expect_ok("compile errors are logged", "
        eval(\"%x = ;\");
        return \"after\";
    ")
        .assert_result("after")
        .assert_logged("eval:");
}

#[test]
fn test_package_queries() {
    Tester::new_single_source_expect_ok("isPackage", "
        package Tools {
            function helper() { return 1; }
        };
        return isPackage(Tools) @ isPackage(\"tools\") @ isPackage(Other);
    ").assert_result("110");
}
