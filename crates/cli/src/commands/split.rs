// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use purse_core::SplitPlan;

use super::{print_json, Context};
use crate::config::parse_hex;
use crate::display::format_plan;
use crate::error::Result;

pub fn run(ctx: &Context, coin: &str, amount: u128, json: bool) -> Result<()> {
    let plan = run_impl(ctx, coin, amount)?;
    if json {
        print_json(&plan)
    } else {
        println!("{}", format_plan(&plan));
        Ok(())
    }
}

pub(crate) fn run_impl(ctx: &Context, coin: &str, amount: u128) -> Result<SplitPlan> {
    let coin = parse_hex("coin", coin)?;
    Ok(ctx.engine().plan_split(ctx.owner(), &coin, amount)?)
}

#[cfg(test)]
#[path = "split_tests.rs"]
mod tests;
