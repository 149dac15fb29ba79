use loopee::{Invocation, ParamName, ParamResolver};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== 测试循环渲染完整功能 ===");

    // 测试列表循环
    let mut resolver = ParamResolver::new();
    resolver.set_param("foreach", "red|green|blue");
    let result = resolver.resolve().render("My Color is {loopee_value}\n");
    println!("列表循环测试:\n{}", result.output);

    // 测试键值对和自定义占位符
    let mut resolver = ParamResolver::new();
    resolver
        .set_param("foreach", "red:ff0000|green:00ff00|blue:0000ff")
        .set_param("as", "color:rgb");
    let result = resolver.resolve().render("Color: {color}, RGB: {rgb}\n");
    println!("键值对测试:\n{}", result.output);

    // 测试整数循环和backspace
    let mut resolver = ParamResolver::new();
    resolver
        .set_param("forint", "5")
        .set_param("to", "25")
        .set_param("by", "5")
        .set_param("backspace", "1");
    let result = resolver.resolve().render("{loopee_value},");
    println!("整数循环测试: {}", result.output);

    // 测试embed继承
    let mut resolver = ParamResolver::new();
    resolver
        .set_embed("embed:foreach", "blog|podcast|link-list")
        .allow_embed(ParamName::Foreach)
        .set_param("as", "channel_id");
    let result = resolver.resolve().render("{loopee_count}: {channel_id}\n");
    println!("embed继承测试:\n{}", result.output);

    // 测试错误的步长方向
    let mut resolver = ParamResolver::new();
    resolver
        .set_param("forint", "5")
        .set_param("to", "25")
        .set_param("by", "-5");
    let result = resolver.resolve().render("{loopee_value},");
    println!("错误方向测试: {:?} {:?}", result.output, result.diagnostics);

    // 测试YAML调用描述
    let invocation = Invocation::from_yaml_str(
        r#"
params:
  foreach: "a\\|b|c"
template: "<{loopee_value}>"
"#,
    )?;
    println!("YAML测试: {}", invocation.run_strict()?);

    println!("=== 所有测试完成 ===");
    Ok(())
}
