//! Demonstrates the isolation boundary between contexts and host globals.
//!
//! Run with: cargo run --example context_isolation

use std::time::Duration;

use script_sandbox::prelude::*;
use script_sandbox::testing::CalcEngine;

fn main() -> Result<()> {
    let sandbox = Sandbox::new(CalcEngine::new(), SandboxConfig::default());

    // Host globals are visible from inside contexts while a run is active.
    sandbox.host().set("host_value", 100);

    println!("=== Fallthrough: contexts read host globals ===");
    let ctx = sandbox.create_context();
    ctx.set("local", 1);
    let unit = sandbox.compile("host_value + local", None)?;
    println!("host_value + local = {}", sandbox.execute_in_context(&unit, &ctx, &ExecOptions::new())?);

    println!("\n=== Shadowing: context bindings win ===");
    ctx.set("host_value", 5);
    println!("host_value + local = {}", sandbox.execute_in_context(&unit, &ctx, &ExecOptions::new())?);

    println!("\n=== Writes never leak to the host ===");
    let unit = sandbox.compile("leaked = 9; leaked", None)?;
    sandbox.execute_in_context(&unit, &ctx, &ExecOptions::new())?;
    println!("context has `leaked`: {}", ctx.contains("leaked"));
    println!("host has `leaked`:    {}", sandbox.host().contains("leaked"));

    println!("\n=== Boundary lifecycle ===");
    println!("boundary installed between runs: {}", sandbox.boundary_installed(&ctx));

    println!("\n=== Timeouts still clean up ===");
    let spin = sandbox.compile("spin(10000)", Some("spin.calc"))?;
    match sandbox.execute_in_context(
        &spin,
        &ctx,
        &ExecOptions::new().time_limit(Duration::from_millis(50)),
    ) {
        Ok(_) => println!("unexpectedly finished"),
        Err(e) => println!("aborted as expected: {e}"),
    }
    println!("active runs after timeout: {}", sandbox.active_runs(&ctx));
    println!("boundary installed after timeout: {}", sandbox.boundary_installed(&ctx));

    Ok(())
}
