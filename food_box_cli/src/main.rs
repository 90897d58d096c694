//! 吃啥盲盒 CLI 工具

use chrono::{Local, Timelike};
use clap::{Parser, Subcommand};
use food_box_core::{
    ClientConfig, ConsoleShell, DrawParams, FileStorage, FoodBoxClient, MealType, SessionStore,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "food-box")]
#[command(about = "吃啥盲盒客户端工具", long_about = None)]
struct Cli {
    /// 后端服务器地址
    #[arg(short, long, default_value = "http://127.0.0.1:8000")]
    server: String,

    /// 云函数代理入口；指定后请求经代理转发
    #[arg(long)]
    proxy: Option<String>,

    /// 本地状态文件路径
    #[arg(long, default_value = ".foodbox.json")]
    state_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 用户注册（注册成功后自动登录）
    Register {
        /// 用户名
        #[arg(short, long)]
        username: String,
        /// 密码
        #[arg(short, long)]
        password: String,
    },
    /// 用户登录
    Login {
        /// 用户名
        #[arg(short, long)]
        username: String,
        /// 密码
        #[arg(short, long)]
        password: String,
    },
    /// 微信授权登录
    WechatLogin {
        /// 微信登录凭证 code
        #[arg(short, long)]
        code: String,
    },
    /// 退出登录
    Logout,
    /// 查看用户信息
    Info,
    /// 抽取美食
    Draw {
        /// 餐类: 1=早餐, 2=午餐, 3=晚餐, 4=夜宵
        #[arg(short, long)]
        meal_type: Option<i64>,
        /// 按当前时间自动选餐类
        #[arg(long, conflicts_with = "meal_type")]
        auto: bool,
        /// 最低价格
        #[arg(long)]
        min_price: Option<f64>,
        /// 最高价格
        #[arg(long)]
        max_price: Option<f64>,
        /// 分类（中餐、西餐、日料等）
        #[arg(long)]
        category: Option<String>,
    },
    /// 查看服务端抽取记录
    Records,
    /// 查看本地历史
    History,
    /// 查看收藏列表
    Favorites,
    /// 查看本地统计
    Stats,
    /// 健康检查
    Health,
    /// 更新微信昵称与头像
    UpdateProfile {
        /// 昵称
        #[arg(short, long)]
        nickname: String,
        /// 头像 URL
        #[arg(short, long)]
        avatar_url: String,
    },
    /// 上传头像文件
    UploadAvatar {
        /// 图片文件路径
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = ClientConfig {
        base_url: cli.server.clone(),
        proxy_url: cli.proxy.clone(),
        timeout: 30,
        verify_tls: false,
        ..Default::default()
    };
    let session = Arc::new(SessionStore::new(Box::new(FileStorage::new(
        &cli.state_file,
    ))));
    let client = FoodBoxClient::new(config, session, Arc::new(ConsoleShell))?;

    match cli.command {
        Commands::Register { username, password } => {
            do_register(&client, &username, &password).await?;
        }
        Commands::Login { username, password } => {
            do_login(&client, &username, &password).await?;
        }
        Commands::WechatLogin { code } => {
            do_wechat_login(&client, &code).await?;
        }
        Commands::Logout => {
            client.logout().await?;
        }
        Commands::Info => {
            do_info(&client).await?;
        }
        Commands::Draw {
            meal_type,
            auto,
            min_price,
            max_price,
            category,
        } => {
            do_draw(&client, meal_type, auto, min_price, max_price, category).await?;
        }
        Commands::Records => {
            do_records(&client).await?;
        }
        Commands::History => {
            do_history(&client).await?;
        }
        Commands::Favorites => {
            do_favorites(&client).await?;
        }
        Commands::Stats => {
            do_stats(&client).await?;
        }
        Commands::Health => {
            do_health(&client).await?;
        }
        Commands::UpdateProfile {
            nickname,
            avatar_url,
        } => {
            client.update_wechat_user_info(&nickname, &avatar_url).await?;
            println!("资料已更新");
        }
        Commands::UploadAvatar { file } => {
            let url = client.upload_avatar(&file).await?;
            println!("头像已上传: {}", url);
        }
    }

    Ok(())
}

async fn do_register(client: &FoodBoxClient, username: &str, password: &str) -> anyhow::Result<()> {
    println!("正在注册用户: {}", username);
    client.sign_up(username, password).await?;
    println!("注册成功，已登录!");
    Ok(())
}

async fn do_login(client: &FoodBoxClient, username: &str, password: &str) -> anyhow::Result<()> {
    println!("正在登录用户: {}", username);
    client.sign_in(username, password).await?;
    println!("登录成功!");

    if let Some(info) = client.session().user_info().await? {
        if let Some(remaining) = info.remaining_times {
            println!("今日剩余抽取次数: {}", remaining);
        }
    }
    Ok(())
}

async fn do_wechat_login(client: &FoodBoxClient, code: &str) -> anyhow::Result<()> {
    println!("正在微信登录...");
    let is_new_user = client.wechat_sign_in(code).await?;
    if is_new_user {
        println!("登录成功，欢迎新用户!");
    } else {
        println!("登录成功!");
    }
    Ok(())
}

async fn do_info(client: &FoodBoxClient) -> anyhow::Result<()> {
    let info = client.get_user_info().await?;
    println!("用户ID: {}", info.id.unwrap_or_default());
    println!("用户名: {}", info.username.as_deref().unwrap_or("-"));
    if let Some(nickname) = &info.nickname {
        println!("昵称: {}", nickname);
    }
    if info.wechat_linked() {
        println!("已绑定微信");
    }
    if let Some(remaining) = info.remaining_times {
        println!("今日剩余抽取次数: {}", remaining);
    }
    if let Some(created_at) = &info.created_at {
        println!("注册时间: {}", created_at);
    }
    Ok(())
}

async fn do_draw(
    client: &FoodBoxClient,
    meal_type: Option<i64>,
    auto: bool,
    min_price: Option<f64>,
    max_price: Option<f64>,
    category: Option<String>,
) -> anyhow::Result<()> {
    let meal_type = if auto {
        Some(MealType::for_hour(Local::now().hour()))
    } else {
        match meal_type {
            Some(value) => Some(
                MealType::from_i64(value)
                    .ok_or_else(|| anyhow::anyhow!("无效的餐类: {}（取值 1-4）", value))?,
            ),
            None => None,
        }
    };

    if let Some(meal_type) = meal_type {
        println!("正在抽取{}...", meal_type.name());
    } else {
        println!("正在抽取...");
    }

    let params = DrawParams {
        meal_type,
        min_price,
        max_price,
        category,
    };
    let data = client.draw(&params).await?;

    println!();
    println!("🎉 抽中了: {}", data.food.name);
    println!("分类: {}", data.food.category);
    if let Some(price) = data.food.price {
        println!("价格: ¥{:.2}", price);
    }
    if let Some(description) = &data.food.description {
        println!("简介: {}", description);
    }
    println!("今日剩余次数: {}", data.remaining_times);

    client.confirm_choice(&data.food).await?;
    Ok(())
}

async fn do_records(client: &FoodBoxClient) -> anyhow::Result<()> {
    let records = client.get_records().await?;
    if records.is_empty() {
        println!("暂无抽取记录");
        return Ok(());
    }
    for record in records {
        let price = record
            .food
            .price
            .map(|p| format!(" ¥{:.2}", p))
            .unwrap_or_default();
        println!(
            "{}  {} [{}]{}",
            record.drawn_at, record.food.name, record.food.category, price
        );
    }
    Ok(())
}

async fn do_history(client: &FoodBoxClient) -> anyhow::Result<()> {
    let history = client.session().history().await?;
    if history.is_empty() {
        println!("暂无本地历史");
        return Ok(());
    }
    for entry in history {
        println!(
            "{}  {}",
            entry.draw_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            entry.name
        );
    }
    Ok(())
}

async fn do_favorites(client: &FoodBoxClient) -> anyhow::Result<()> {
    let favorites = client.session().favorites().await?;
    if favorites.is_empty() {
        println!("暂无收藏");
        return Ok(());
    }
    for entry in favorites {
        let price = entry.price.map(|p| format!(" ¥{:.2}", p)).unwrap_or_default();
        println!("{}{}", entry.name, price);
    }
    Ok(())
}

async fn do_stats(client: &FoodBoxClient) -> anyhow::Result<()> {
    let stats = client.session().stats().await?;
    println!("累计抽取: {}", stats.total_draws);
    println!("收藏数量: {}", stats.favorite_count);
    Ok(())
}

async fn do_health(client: &FoodBoxClient) -> anyhow::Result<()> {
    let healthy = client.health_check().await?;
    if healthy {
        println!("服务状态: 正常");
    } else {
        println!("服务状态: 异常");
    }
    Ok(())
}
