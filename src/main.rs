use clap::{Parser, Subcommand, ValueEnum};
use memorepo::core::{Record, Value};
use memorepo::query::Arg;
use memorepo::sample::{self, AGE, Member, MemberDto, NestedClosedProjection, Team};
use memorepo::{
    Assignment, EntityRef, FromColumns, MethodOptions, PageRequest, Params, Repository,
    RepositoryConfig, ResultSet, Sort, Store,
};
use serde::Serialize;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "memorepo")]
#[command(about = "Runs repository scenarios against the in-memory executor")]
struct Cli {
    /// Repository configuration as a JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Output::Table)]
    output: Output,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Page through members ordered by username, descending
    Page {
        #[arg(long, default_value_t = 0)]
        index: i64,
        #[arg(long, default_value_t = 3)]
        size: i64,
    },
    /// Increment the age of members aged 20 or more
    Bulk {
        #[arg(long)]
        clear: bool,
    },
    /// Project members with their team
    Projections,
    /// Run a joined native query with a named parameter
    Native {
        #[arg(long, default_value = "teamA")]
        team: String,
    },
    /// Print executor statistics after running every scenario
    All,
}

struct Demo {
    store: Store,
    members: Repository<Member>,
    output: Output,
}

impl Demo {
    fn new(config: RepositoryConfig, output: Output) -> Result<Self, Box<dyn Error>> {
        let store = Store::with_config(sample::mapping()?, config)?;
        let members = store
            .repository::<Member>()
            .default_sort(Sort::asc("username"))
            .method("findByAgeGreaterThanEqual")
            .method_with(
                "findByUsernameStartingWith",
                MethodOptions::new().read_only().fetch("team"),
            )
            .native_query_with_count(
                "membersOfTeam",
                "select m.* from member m join team t on m.team_id = t.id where t.name = :team order by m.username",
                "select count(*) from member m join team t on m.team_id = t.id where t.name = :team",
            )
            .build()?;
        Ok(Self {
            store,
            members,
            output,
        })
    }

    async fn seed(&self) -> Result<(), Box<dyn Error>> {
        let uow = self.store.begin().await?;
        let team_a = uow.persist(Team::new("teamA")).await?;
        let team_b = uow.persist(Team::new("teamB")).await?;
        for (name, age, team) in [
            ("m1", 10, Some(&team_a)),
            ("m2", 19, Some(&team_a)),
            ("m3", 20, Some(&team_b)),
            ("m4", 21, None),
            ("m5", 40, Some(&team_b)),
        ] {
            let member = EntityRef::new(Member::new(name, age));
            Member::change_team(&member, team)?;
            uow.persist_ref(&member).await?;
        }
        uow.commit().await?;
        Ok(())
    }

    fn emit<T: Serialize>(&self, title: &str, table: &ResultSet, value: &T) -> Result<(), Box<dyn Error>> {
        match self.output {
            Output::Table => {
                println!("== {} ==", title);
                table.print();
                println!();
            }
            Output::Json => println!("{}", serde_json::to_string_pretty(value)?),
        }
        Ok(())
    }

    async fn page(&self, index: i64, size: i64) -> Result<(), Box<dyn Error>> {
        let uow = self.store.begin().await?;
        let request = PageRequest::sorted_by(index, size, Sort::desc("username"))?;
        let page = self
            .members
            .find_page(&uow, "findByAgeGreaterThanEqual", &[Arg::value(0)], &request)
            .await?;
        let records = records(page.content())?;
        let title = format!(
            "page {} of {} ({} members, has next: {})",
            page.index() + 1,
            page.total_pages(),
            page.total_elements(),
            page.has_next()
        );
        self.emit(&title, &table(&records), &page.map(|m| m.key()))?;
        uow.rollback().await?;
        Ok(())
    }

    async fn bulk(&self, clear: bool) -> Result<(), Box<dyn Error>> {
        let uow = self.store.begin().await?;
        let before = self.members.find_all(&uow).await?;
        let updated = self
            .members
            .bulk_update(
                &uow,
                &AGE.greater_than_or_equal(20),
                &[Assignment::increment("age", 1)],
                Some(clear),
            )
            .await?;
        log::info!("Bulk update touched {} row(s)", updated);

        let after = self.members.find_all(&uow).await?;
        let title = format!(
            "{} row(s) updated, identity map {}",
            updated,
            if clear { "cleared" } else { "kept (values may be stale)" }
        );
        let rows = records(&after)?;
        self.emit(&title, &table(&rows), &rows)?;
        log::debug!("{} member(s) were managed before the update", before.len());
        uow.commit().await?;
        Ok(())
    }

    async fn projections(&self) -> Result<(), Box<dyn Error>> {
        let uow = self.store.begin().await?;
        let views: Vec<NestedClosedProjection> = self
            .members
            .find_projected(&uow, "findByUsernameStartingWith", &[Arg::value("m")])
            .await?;
        let rows: Vec<Record> = views
            .iter()
            .map(|v| {
                Record::new()
                    .with("username", v.username.as_str())
                    .with("team", v.team.as_ref().map(|t| t.name.as_str()))
            })
            .collect();
        self.emit("nested closed projection", &table(&rows), &views)?;

        let dtos: Vec<MemberDto> = self
            .members
            .find_dtos(&uow, "findByUsernameStartingWith", &[Arg::value("m")])
            .await?;
        let dto_rows = ResultSet::new(
            MemberDto::columns().iter().map(|c| c.to_string()).collect(),
            dtos.iter()
                .map(|d| vec![Value::from(d.username.as_str()), Value::from(d.team_name.clone())])
                .collect(),
        );
        self.emit("constructor DTOs", &dto_rows, &dtos)?;
        uow.rollback().await?;
        Ok(())
    }

    async fn native(&self, team: &str) -> Result<(), Box<dyn Error>> {
        let uow = self.store.begin().await?;
        let rows = self
            .members
            .native_rows(&uow, "membersOfTeam", Params::new().named("team", team))
            .await?;
        self.emit(&format!("members of {}", team), &rows, &rows)?;
        uow.rollback().await?;
        Ok(())
    }
}

fn records(members: &[EntityRef<Member>]) -> Result<Vec<Record>, Box<dyn Error>> {
    Ok(members.iter().map(|m| m.record()).collect::<Result<_, _>>()?)
}

fn table(records: &[Record]) -> ResultSet {
    let columns: Vec<String> = records
        .first()
        .map(|r| r.names().map(str::to_string).collect())
        .unwrap_or_default();
    let rows = records
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| r.get(c).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    ResultSet::new(columns, rows)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RepositoryConfig::from_json(&fs::read_to_string(path)?)?,
        None => RepositoryConfig::default(),
    };

    let demo = Demo::new(config, cli.output)?;
    demo.seed().await?;

    match cli.command {
        Command::Page { index, size } => demo.page(index, size).await?,
        Command::Bulk { clear } => demo.bulk(clear).await?,
        Command::Projections => demo.projections().await?,
        Command::Native { team } => demo.native(&team).await?,
        Command::All => {
            demo.page(0, 3).await?;
            demo.page(1, 3).await?;
            demo.projections().await?;
            demo.native("teamA").await?;
            demo.bulk(true).await?;
            let stats = demo.store.executor().stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
